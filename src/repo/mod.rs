use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::*;
use crate::search::BoardingSearch;

pub mod inmem;
#[cfg(feature = "postgres-store")]
pub mod pg;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    /// The store rejected or failed a statement.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// `Conflict` when the (case-insensitive) email is already registered.
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn list_users(&self, query: &UserQuery) -> RepoResult<Vec<User>>;
    /// Deletes the user with everything they own; returns the image files
    /// that no longer have a row pointing at them.
    async fn delete_user(&self, id: Id) -> RepoResult<Vec<String>>;
}

#[async_trait]
pub trait BoardingRepo: Send + Sync {
    async fn create_boarding(&self, owner_id: Id, input: BoardingInput, approved: bool) -> RepoResult<Boarding>;
    async fn get_boarding(&self, id: Id) -> RepoResult<Boarding>;
    async fn search_boardings(&self, search: &BoardingSearch) -> RepoResult<Vec<Boarding>>;
    async fn list_boardings_by_owner(&self, owner_id: Id) -> RepoResult<Vec<Boarding>>;
    async fn owner_stats(&self, owner_id: Id) -> RepoResult<OwnerStats>;
    async fn boarding_images(&self, id: Id) -> RepoResult<Vec<String>>;
    /// Batch image lookup; boardings without images are absent from the map.
    async fn images_for_boardings(&self, ids: &[Id]) -> RepoResult<HashMap<Id, Vec<String>>>;
    async fn add_boarding_image(&self, id: Id, image_name: &str) -> RepoResult<()>;
    async fn update_boarding(&self, id: Id, input: BoardingInput) -> RepoResult<Boarding>;
    /// Returns the image files released by the delete.
    async fn delete_boarding(&self, id: Id) -> RepoResult<Vec<String>>;
    async fn is_boarding_owner(&self, id: Id, user_id: Id) -> RepoResult<bool>;
    async fn set_boarding_approval(&self, id: Id, approved: bool) -> RepoResult<Boarding>;
}

#[async_trait]
pub trait ServiceRepo: Send + Sync {
    async fn create_service(&self, provider_id: Id, input: ServiceInput, approved: bool) -> RepoResult<Service>;
    async fn list_services(&self, approved_only: bool) -> RepoResult<Vec<Service>>;
    async fn get_service(&self, id: Id) -> RepoResult<Service>;
    async fn list_services_by_provider(&self, provider_id: Id) -> RepoResult<Vec<Service>>;
    async fn update_service(&self, id: Id, input: ServiceInput) -> RepoResult<Service>;
    /// Returns the image file released by the delete, if any.
    async fn delete_service(&self, id: Id) -> RepoResult<Option<String>>;
    async fn is_service_provider(&self, id: Id, user_id: Id) -> RepoResult<bool>;
    /// Returns the image it replaced, if any.
    async fn set_service_image(&self, id: Id, image_name: &str) -> RepoResult<Option<String>>;
    async fn set_service_approval(&self, id: Id, approved: bool) -> RepoResult<Service>;
}

#[async_trait]
pub trait FavoriteRepo: Send + Sync {
    /// `true` when newly added, `false` when it already existed.
    async fn add_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool>;
    /// `true` when a row was removed.
    async fn remove_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool>;
    async fn list_favorites(&self, user_id: Id) -> RepoResult<Vec<FavoriteBoarding>>;
    async fn is_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool>;
}

pub trait Repo: UserRepo + BoardingRepo + ServiceRepo + FavoriteRepo {}

impl<T> Repo for T where T: UserRepo + BoardingRepo + ServiceRepo + FavoriteRepo {}

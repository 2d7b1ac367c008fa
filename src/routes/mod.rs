use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{InMemorySessionStore, SessionStore};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::{Boarding, BoardingDetail, Id};
use crate::rate_limit::{InMemoryRateLimiter, RateLimiterFacade};
use crate::repo::{Repo, RepoResult};
use crate::storage::ImageStore;

pub mod auth;
pub mod boardings;
pub mod favorites;
pub mod services;
pub mod uploads;
pub mod users;

/// Shared handler state, injected once as `web::Data<AppState>`.
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub image_store: Arc<dyn ImageStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<AppConfig>,
    pub rate_limiter: Option<RateLimiterFacade>,
}

impl AppState {
    /// Builds the session store and rate limiter from `config`.
    pub fn new(repo: Arc<dyn Repo>, image_store: Arc<dyn ImageStore>, config: AppConfig) -> Self {
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(config.session_ttl));
        let rate_limiter = config
            .rate_limit_enabled
            .then(|| RateLimiterFacade::new(InMemoryRateLimiter::new(true), config.rate_limits.clone()));
        Self { repo, image_store, sessions, config: Arc::new(config), rate_limiter }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid JSON format: {err}")).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid query string: {err}")).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid path parameter: {err}")).into()
    }))
    .service(
        web::scope("/api/v1")
            .service(
                web::resource("/boardings")
                    .route(web::get().to(boardings::get_boardings))
                    .route(web::post().to(boardings::create_boarding))
                    .route(web::put().to(boardings::update_boarding))
                    .route(web::delete().to(boardings::delete_boarding))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/services")
                    .route(web::get().to(services::get_services))
                    .route(web::post().to(services::create_service))
                    .route(web::put().to(services::update_service))
                    .route(web::delete().to(services::delete_service))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/favorites")
                    .route(web::get().to(favorites::get_favorites))
                    .route(web::post().to(favorites::add_favorite))
                    .route(web::delete().to(favorites::remove_favorite))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/upload_images")
                    .route(web::post().to(uploads::upload_images))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/register")
                    .route(web::post().to(auth::register))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/login")
                    .route(web::post().to(auth::login))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/logout")
                    .route(web::post().to(auth::logout))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/me")
                    .route(web::get().to(auth::me))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/users")
                    .route(web::get().to(users::list_users))
                    .route(web::delete().to(users::delete_user))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/admin/boardings/{id}/approval")
                    .route(web::post().to(boardings::set_approval))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/admin/services/{id}/approval")
                    .route(web::post().to(services::set_approval))
                    .default_service(web::to(method_not_allowed)),
            )
            .default_service(web::to(not_found)),
    )
    .service(web::resource("/uploads/{name}").route(web::get().to(uploads::serve_image)));
}

async fn method_not_allowed() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed)
}

async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Endpoint not found".into()))
}

/// `?id=` style query used by DELETE endpoints. Kept as text so a bad value
/// is reported by the handler, not the extractor.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApprovalPayload {
    pub approved: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FavoriteStatus {
    pub boarding_id: Id,
    pub is_favorite: bool,
}

/// Attach images to boardings with one batch lookup.
pub(crate) async fn with_images(repo: &dyn Repo, rows: Vec<Boarding>) -> RepoResult<Vec<BoardingDetail>> {
    let ids: Vec<Id> = rows.iter().map(|b| b.id).collect();
    let mut images: HashMap<Id, Vec<String>> = repo.images_for_boardings(&ids).await?;
    Ok(rows
        .into_iter()
        .map(|boarding| {
            let images = images.remove(&boarding.id).unwrap_or_default();
            BoardingDetail { boarding, images }
        })
        .collect())
}

pub(crate) fn client_ip(req: &HttpRequest) -> String {
    req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string()
}

/// Query flags are true only for the literal `true` or `1`.
pub(crate) fn flag(raw: &Option<String>) -> bool {
    matches!(raw.as_deref().map(str::trim), Some("true") | Some("1"))
}

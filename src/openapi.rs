use utoipa::OpenApi;

use crate::auth::Role;
use crate::models::{Boarding, BoardingDetail, BoardingType, CreatedId, FavoriteBoarding, OwnerStats, Service, User};
use crate::routes::{self, ApprovalPayload, FavoriteStatus};
use crate::validation::{BoardingPayload, LoginPayload, RegisterPayload, ServicePayload};

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::boardings::get_boardings,
        routes::boardings::create_boarding,
        routes::boardings::update_boarding,
        routes::boardings::delete_boarding,
        routes::boardings::set_approval,
        routes::services::get_services,
        routes::services::create_service,
        routes::services::update_service,
        routes::services::delete_service,
        routes::services::set_approval,
        routes::favorites::get_favorites,
        routes::favorites::add_favorite,
        routes::favorites::remove_favorite,
        routes::uploads::upload_images,
        routes::auth::register,
        routes::auth::login,
        routes::auth::logout,
        routes::auth::me,
        routes::users::list_users,
        routes::users::delete_user,
    ),
    components(schemas(
        Boarding, BoardingDetail, BoardingType, CreatedId, FavoriteBoarding, OwnerStats, Service, User, Role,
        BoardingPayload, ServicePayload, RegisterPayload, LoginPayload, ApprovalPayload, FavoriteStatus,
        routes::favorites::FavoritePayload, routes::auth::LoginResponse,
        routes::uploads::UploadedFiles, routes::uploads::UploadedFile,
    )),
    tags(
        (name = "boardings", description = "Boarding listings and search"),
        (name = "services", description = "Student service listings"),
        (name = "favorites", description = "Saved boardings"),
        (name = "uploads", description = "Listing images"),
        (name = "auth", description = "Registration and sessions"),
        (name = "users", description = "Account administration"),
        (name = "admin", description = "Moderation"),
    )
)]
pub struct ApiDoc;

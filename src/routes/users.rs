use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{AppState, IdQuery};
use crate::auth::{Auth, Role};
use crate::error::{or_not_found, ApiError};
use crate::models::{ApiResponse, UserQuery};
use crate::require_role;
use crate::storage::reap;
use crate::validation::parse_id;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Case-insensitive match on name or email.
    pub search: Option<String>,
    pub role: Option<String>,
}

impl UserListQuery {
    fn to_query(&self) -> Result<UserQuery, ApiError> {
        let search = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let role = match self.role.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(r) => Some(r.parse::<Role>().map_err(|e| ApiError::Validation(e.to_string()))?),
        };
        Ok(UserQuery { search, role })
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Matching users, newest first", body = [User]),
        (status = 403, description = "Admins only")
    ),
    tag = "users"
)]
pub async fn list_users(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin, "Forbidden. Admins only");
    let users = data.repo.list_users(&query.to_query()?).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Users retrieved successfully", users)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users",
    params(IdQuery),
    responses(
        (status = 200, description = "User and everything they own deleted"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn delete_user(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin, "Forbidden. Admins only");
    let id = parse_id("User ID", query.id.as_deref())?;
    let released = data.repo.delete_user(id).await.map_err(or_not_found("User not found"))?;
    data.sessions.revoke_user(id);
    reap(&data.image_store, &released).await;
    tracing::info!(user_id = id, by = auth.0.user_id, images = released.len(), "user deleted");
    Ok(HttpResponse::Ok().json(ApiResponse::message("User was deleted")))
}

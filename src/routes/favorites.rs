use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use super::{AppState, FavoriteStatus};
use crate::auth::Auth;
use crate::error::{or_not_found, ApiError};
use crate::models::ApiResponse;
use crate::validation::{id_from_value, parse_id};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FavoriteQuery {
    pub boarding_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FavoritePayload {
    #[schema(value_type = i64)]
    pub boarding_id: Option<Value>,
}

#[utoipa::path(
    get,
    path = "/api/v1/favorites",
    params(FavoriteQuery),
    responses(
        (status = 200, description = "Caller's favorites, or the favorite status of one boarding", body = [FavoriteBoarding]),
        (status = 401, description = "Not logged in")
    ),
    tag = "favorites"
)]
pub async fn get_favorites(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<FavoriteQuery>,
) -> Result<HttpResponse, ApiError> {
    let user_id = auth.0.user_id;
    if query.boarding_id.is_some() {
        let boarding_id = parse_id("boarding_id", query.boarding_id.as_deref())?;
        let is_favorite = data.repo.is_favorite(user_id, boarding_id).await?;
        return Ok(HttpResponse::Ok()
            .json(ApiResponse::ok("Favorite status retrieved", FavoriteStatus { boarding_id, is_favorite })));
    }

    let mut favorites = data.repo.list_favorites(user_id).await?;
    let ids: Vec<_> = favorites.iter().map(|f| f.boarding.id).collect();
    let mut images = data.repo.images_for_boardings(&ids).await?;
    for fav in &mut favorites {
        fav.images = images.remove(&fav.boarding.id).unwrap_or_default();
    }
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Favorites retrieved successfully", favorites)))
}

#[utoipa::path(
    post,
    path = "/api/v1/favorites",
    request_body = FavoritePayload,
    responses(
        (status = 201, description = "Added to favorites"),
        (status = 200, description = "Already a favorite"),
        (status = 404, description = "Boarding not found")
    ),
    tag = "favorites"
)]
pub async fn add_favorite(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<FavoritePayload>,
) -> Result<HttpResponse, ApiError> {
    let boarding_id = id_from_value("boarding_id", &payload.boarding_id)?;
    let added = data
        .repo
        .add_favorite(auth.0.user_id, boarding_id)
        .await
        .map_err(or_not_found("Boarding not found"))?;
    let status = FavoriteStatus { boarding_id, is_favorite: true };
    if added {
        Ok(HttpResponse::Created().json(ApiResponse::ok("Added to favorites", status)))
    } else {
        Ok(HttpResponse::Ok().json(ApiResponse::ok("Already in favorites", status)))
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/favorites",
    params(FavoriteQuery),
    responses(
        (status = 200, description = "Removed from favorites (also when it was not a favorite)")
    ),
    tag = "favorites"
)]
pub async fn remove_favorite(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<FavoriteQuery>,
) -> Result<HttpResponse, ApiError> {
    let boarding_id = parse_id("boarding_id", query.boarding_id.as_deref())?;
    let removed = data.repo.remove_favorite(auth.0.user_id, boarding_id).await?;
    tracing::debug!(boarding_id, removed, "favorite removed");
    Ok(HttpResponse::Ok()
        .json(ApiResponse::ok("Removed from favorites", FavoriteStatus { boarding_id, is_favorite: false })))
}

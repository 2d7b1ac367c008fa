use actix_web::{web, HttpResponse};

use super::{flag, with_images, AppState, ApprovalPayload, IdQuery};
use crate::auth::{Auth, Role};
use crate::error::{or_not_found, ApiError};
use crate::models::{ApiResponse, Boarding, BoardingDetail, CreatedId, Id, OwnerStats};
use crate::require_role;
use crate::search::{BoardingSearch, SearchParams};
use crate::storage::reap;
use crate::validation::{id_from_value, parse_id, BoardingPayload};

const NOT_FOUND: &str = "Boarding not found";

/// Owner of record or an admin may change a listing.
async fn ensure_can_modify(data: &AppState, auth: &Auth, id: Id, action: &str) -> Result<(), ApiError> {
    let owns = data.repo.is_boarding_owner(id, auth.0.user_id).await.map_err(or_not_found(NOT_FOUND))?;
    if owns || auth.0.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Forbidden. You can only {action} your own boardings")))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/boardings",
    params(SearchParams),
    responses(
        (status = 200, description = "One listing, an owner's listings or stats, or search results", body = [BoardingDetail]),
        (status = 400, description = "Invalid filter value"),
        (status = 403, description = "all=true without admin role"),
        (status = 404, description = "Boarding not found")
    ),
    tag = "boardings"
)]
pub async fn get_boardings(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    query: web::Query<SearchParams>,
) -> Result<HttpResponse, ApiError> {
    let params = query.into_inner();
    let repo = data.repo.as_ref();

    if params.id.is_some() {
        let id = parse_id("id", params.id.as_deref())?;
        let boarding = repo.get_boarding(id).await.map_err(or_not_found(NOT_FOUND))?;
        let images = repo.boarding_images(id).await?;
        return Ok(HttpResponse::Ok()
            .json(ApiResponse::ok("Boarding retrieved successfully", BoardingDetail { boarding, images })));
    }

    if params.owner_id.is_some() {
        let owner_id = parse_id("owner_id", params.owner_id.as_deref())?;
        if flag(&params.stats) {
            let stats: OwnerStats = repo.owner_stats(owner_id).await?;
            return Ok(HttpResponse::Ok().json(ApiResponse::ok("Statistics retrieved successfully", stats)));
        }
        let rows = repo.list_boardings_by_owner(owner_id).await?;
        let details = with_images(repo, rows).await?;
        return Ok(HttpResponse::Ok().json(ApiResponse::ok("Owner boardings retrieved successfully", details)));
    }

    let search = if flag(&params.all) {
        match &auth {
            None => return Err(ApiError::Unauthenticated("Unauthorized. Please login to continue".into())),
            Some(a) if !a.0.is_admin() => return Err(ApiError::Forbidden("Forbidden. Admins only".into())),
            Some(_) => BoardingSearch::ShowAll,
        }
    } else {
        BoardingSearch::from_params(&params, data.config.require_listing_approval)
            .map_err(|e| ApiError::Validation(e.to_string()))?
    };
    let rows = repo.search_boardings(&search).await?;
    tracing::debug!(results = rows.len(), "boarding search");
    let details = with_images(repo, rows).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Boardings retrieved successfully", details)))
}

#[utoipa::path(
    post,
    path = "/api/v1/boardings",
    request_body = BoardingPayload,
    responses(
        (status = 201, description = "Boarding created", body = CreatedId),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Caller is not an owner")
    ),
    tag = "boardings"
)]
pub async fn create_boarding(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<BoardingPayload>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Owner, "Forbidden. Only boarding owners can create listings");
    let input = payload.validate()?;
    let approved = !data.config.require_listing_approval;
    let boarding = data.repo.create_boarding(auth.0.user_id, input, approved).await?;
    tracing::info!(boarding_id = boarding.id, owner_id = boarding.owner_id, "boarding created");
    Ok(HttpResponse::Created().json(ApiResponse::ok("Boarding created successfully", CreatedId { id: boarding.id })))
}

#[utoipa::path(
    put,
    path = "/api/v1/boardings",
    request_body = BoardingPayload,
    responses(
        (status = 200, description = "Boarding updated", body = Boarding),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the owner of record"),
        (status = 404, description = "Boarding not found")
    ),
    tag = "boardings"
)]
pub async fn update_boarding(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<BoardingPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = id_from_value("Boarding ID", &payload.id)?;
    let input = payload.validate()?;
    ensure_can_modify(&data, &auth, id, "edit").await?;
    let boarding = data.repo.update_boarding(id, input).await.map_err(or_not_found(NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Boarding updated successfully", boarding)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/boardings",
    params(IdQuery),
    responses(
        (status = 200, description = "Boarding deleted"),
        (status = 403, description = "Not the owner of record"),
        (status = 404, description = "Boarding not found")
    ),
    tag = "boardings"
)]
pub async fn delete_boarding(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id("Boarding ID", query.id.as_deref())?;
    ensure_can_modify(&data, &auth, id, "delete").await?;
    let released = data.repo.delete_boarding(id).await.map_err(or_not_found(NOT_FOUND))?;
    reap(&data.image_store, &released).await;
    tracing::info!(boarding_id = id, images = released.len(), "boarding deleted");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Boarding deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/boardings/{id}/approval",
    request_body = ApprovalPayload,
    params(("id" = i64, Path, description = "Boarding id")),
    responses(
        (status = 200, description = "Approval updated", body = Boarding),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Boarding not found")
    ),
    tag = "admin"
)]
pub async fn set_approval(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<ApprovalPayload>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin, "Forbidden. Admins only");
    let boarding: Boarding = data
        .repo
        .set_boarding_approval(path.into_inner(), payload.approved)
        .await
        .map_err(or_not_found(NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Boarding approval updated", boarding)))
}

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{AppState, ApprovalPayload, IdQuery};
use crate::auth::{Auth, Role};
use crate::error::{or_not_found, ApiError};
use crate::models::{ApiResponse, CreatedId, Id};
use crate::require_role;
use crate::storage::reap;
use crate::validation::{id_from_value, parse_id, ServicePayload};

const NOT_FOUND: &str = "Service not found";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServiceQuery {
    pub id: Option<String>,
    pub provider_id: Option<String>,
}

async fn ensure_can_modify(data: &AppState, auth: &Auth, id: Id, action: &str) -> Result<(), ApiError> {
    let provides = data.repo.is_service_provider(id, auth.0.user_id).await.map_err(or_not_found(NOT_FOUND))?;
    if provides || auth.0.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Forbidden. You can only {action} your own services")))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/services",
    params(ServiceQuery),
    responses(
        (status = 200, description = "One service, a provider's services, or the public list", body = [Service]),
        (status = 404, description = "Service not found")
    ),
    tag = "services"
)]
pub async fn get_services(data: web::Data<AppState>, query: web::Query<ServiceQuery>) -> Result<HttpResponse, ApiError> {
    if query.id.is_some() {
        let id = parse_id("id", query.id.as_deref())?;
        let service = data.repo.get_service(id).await.map_err(or_not_found(NOT_FOUND))?;
        return Ok(HttpResponse::Ok().json(ApiResponse::ok("Service retrieved successfully", service)));
    }
    if query.provider_id.is_some() {
        let provider_id = parse_id("provider_id", query.provider_id.as_deref())?;
        let services = data.repo.list_services_by_provider(provider_id).await?;
        return Ok(HttpResponse::Ok().json(ApiResponse::ok("Provider services retrieved successfully", services)));
    }
    let services = data.repo.list_services(data.config.require_listing_approval).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Services retrieved successfully", services)))
}

#[utoipa::path(
    post,
    path = "/api/v1/services",
    request_body = ServicePayload,
    responses(
        (status = 201, description = "Service created", body = CreatedId),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Caller is not a service provider")
    ),
    tag = "services"
)]
pub async fn create_service(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<ServicePayload>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Service, "Forbidden. Only service providers can create services");
    let input = payload.validate()?;
    let approved = !data.config.require_listing_approval;
    let service = data.repo.create_service(auth.0.user_id, input, approved).await?;
    tracing::info!(service_id = service.id, provider_id = service.provider_id, "service created");
    Ok(HttpResponse::Created().json(ApiResponse::ok("Service created successfully", CreatedId { id: service.id })))
}

#[utoipa::path(
    put,
    path = "/api/v1/services",
    request_body = ServicePayload,
    responses(
        (status = 200, description = "Service updated", body = Service),
        (status = 403, description = "Not the provider of record"),
        (status = 404, description = "Service not found")
    ),
    tag = "services"
)]
pub async fn update_service(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<ServicePayload>,
) -> Result<HttpResponse, ApiError> {
    let id = id_from_value("Service ID", &payload.id)?;
    let input = payload.validate()?;
    ensure_can_modify(&data, &auth, id, "edit").await?;
    let service = data.repo.update_service(id, input).await.map_err(or_not_found(NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Service updated successfully", service)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/services",
    params(IdQuery),
    responses(
        (status = 200, description = "Service deleted"),
        (status = 403, description = "Not the provider of record"),
        (status = 404, description = "Service not found")
    ),
    tag = "services"
)]
pub async fn delete_service(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id("Service ID", query.id.as_deref())?;
    ensure_can_modify(&data, &auth, id, "delete").await?;
    let released = data.repo.delete_service(id).await.map_err(or_not_found(NOT_FOUND))?;
    let released: Vec<String> = released.into_iter().collect();
    reap(&data.image_store, &released).await;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Service deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/services/{id}/approval",
    request_body = ApprovalPayload,
    params(("id" = i64, Path, description = "Service id")),
    responses(
        (status = 200, description = "Approval updated", body = Service),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Service not found")
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
    let service = data
        .repo
        .set_service_approval(path.into_inner(), payload.approved)
        .await
        .map_err(or_not_found(NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Service approval updated", service)))
}

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::auth::{Auth, Role};
use crate::error::{or_not_found, ApiError};
use crate::models::{ApiResponse, Id};
use crate::require_role;
use crate::storage::{reap, sniff_image, store_upload, ImageStoreError};
use crate::validation::parse_id;

const MAX_TEXT_FIELD: usize = 64;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadedFiles {
    pub files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadedFile {
    pub file: String,
}

struct IncomingFile {
    file_name: String,
    bytes: Vec<u8>,
}

/// Buffered form: text ids plus files grouped by field.
#[derive(Default)]
struct UploadForm {
    boarding_id: Option<String>,
    service_id: Option<String>,
    boarding_files: Vec<IncomingFile>,
    service_file: Option<IncomingFile>,
}

fn multipart_error(e: actix_multipart::MultipartError) -> ApiError {
    tracing::warn!("multipart error: {e}");
    ApiError::Validation("Malformed multipart body".into())
}

async fn read_form(mut payload: Multipart, max_bytes: usize, max_files: usize) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let file_name = disposition.get_filename().map(str::to_string);

        let limit = if file_name.is_some() { max_bytes } else { MAX_TEXT_FIELD };
        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > limit {
                return Err(if file_name.is_some() {
                    ApiError::PayloadTooLarge
                } else {
                    ApiError::Validation(format!("Field {name} is too long"))
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        match (name.as_str(), file_name) {
            ("boarding_id", None) => form.boarding_id = Some(String::from_utf8_lossy(&bytes).into_owned()),
            ("service_id", None) => form.service_id = Some(String::from_utf8_lossy(&bytes).into_owned()),
            ("images" | "images[]", Some(file_name)) => {
                if form.boarding_files.len() >= max_files {
                    return Err(ApiError::Validation(format!("Too many images. At most {max_files} per upload")));
                }
                form.boarding_files.push(IncomingFile { file_name, bytes });
            }
            ("image", Some(file_name)) => form.service_file = Some(IncomingFile { file_name, bytes }),
            (other, _) => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

fn check_image(file: &IncomingFile) -> Result<(), ApiError> {
    if file.bytes.is_empty() || sniff_image(&file.bytes).is_none() {
        return Err(ApiError::UnsupportedMediaType);
    }
    Ok(())
}

fn store_error(e: ImageStoreError) -> ApiError {
    tracing::error!("image store write failed: {e}");
    ApiError::Internal
}

#[utoipa::path(
    post,
    path = "/api/v1/upload_images",
    request_body(content = String, content_type = "multipart/form-data", description = "`boarding_id` with `images`/`images[]` files, or `service_id` with one `image` file"),
    responses(
        (status = 200, description = "Images stored", body = UploadedFiles),
        (status = 400, description = "No images or id provided"),
        (status = 403, description = "Caller does not own the target"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Not a supported image")
    ),
    tag = "uploads"
)]
pub async fn upload_images(auth: Auth, data: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Owner | Role::Service | Role::Admin);
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_upload(auth.0.user_id) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let cfg = &data.config;
    let form = read_form(payload, cfg.max_upload_bytes, cfg.max_images_per_upload).await?;

    if form.boarding_id.is_some() && !form.boarding_files.is_empty() {
        let id = parse_id("boarding_id", form.boarding_id.as_deref())?;
        form.boarding_files.iter().try_for_each(check_image)?;
        let owns = data.repo.is_boarding_owner(id, auth.0.user_id).await.map_err(or_not_found("Boarding not found"))?;
        if !owns && !auth.0.is_admin() {
            return Err(ApiError::Forbidden("Forbidden. You can only upload images for your own boardings".into()));
        }
        let files = store_boarding_images(&data, id, &form.boarding_files).await?;
        tracing::info!(boarding_id = id, count = files.len(), "boarding images uploaded");
        return Ok(HttpResponse::Ok().json(ApiResponse::ok("Boarding images uploaded", UploadedFiles { files })));
    }

    if let (Some(raw_id), Some(file)) = (form.service_id.as_deref(), form.service_file.as_ref()) {
        let id = parse_id("service_id", Some(raw_id))?;
        check_image(file)?;
        let provides =
            data.repo.is_service_provider(id, auth.0.user_id).await.map_err(or_not_found("Service not found"))?;
        if !provides && !auth.0.is_admin() {
            return Err(ApiError::Forbidden("Forbidden. You can only upload images for your own services".into()));
        }
        let name = store_upload(data.image_store.as_ref(), &file.file_name, &file.bytes).await.map_err(store_error)?;
        let previous = match data.repo.set_service_image(id, &name).await {
            Ok(previous) => previous,
            Err(e) => {
                reap(&data.image_store, std::slice::from_ref(&name)).await;
                return Err(e.into());
            }
        };
        if let Some(previous) = previous {
            reap(&data.image_store, &[previous]).await;
        }
        tracing::info!(service_id = id, file = %name, "service image uploaded");
        return Ok(HttpResponse::Ok().json(ApiResponse::ok("Service image uploaded", UploadedFile { file: name })));
    }

    Err(ApiError::Validation("No images or ID provided".into()))
}

/// Write and attach each file in turn. Files attached before a failure stay
/// attached; the file whose row could not be written is removed.
async fn store_boarding_images(data: &AppState, id: Id, files: &[IncomingFile]) -> Result<Vec<String>, ApiError> {
    let mut stored: Vec<String> = Vec::with_capacity(files.len());
    for file in files {
        let name = store_upload(data.image_store.as_ref(), &file.file_name, &file.bytes).await.map_err(store_error)?;
        if let Err(e) = data.repo.add_boarding_image(id, &name).await {
            reap(&data.image_store, &[name]).await;
            return Err(e.into());
        }
        stored.push(name);
    }
    Ok(stored)
}

#[derive(Debug, Deserialize)]
pub struct ImagePath {
    pub name: String,
}

/// Serves a stored upload. No listing endpoint exists for the directory.
pub async fn serve_image(data: web::Data<AppState>, path: web::Path<ImagePath>) -> Result<HttpResponse, ApiError> {
    match data.image_store.load(&path.name).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, mime))
            .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
            .body(bytes)),
        Err(ImageStoreError::NotFound | ImageStoreError::InvalidName) => Err(ApiError::NotFound("Image not found".into())),
        Err(e) => {
            tracing::error!("image store read failed: {e}");
            Err(ApiError::Internal)
        }
    }
}

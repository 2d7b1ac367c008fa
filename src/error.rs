use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::models::ApiResponse;
use crate::repo::RepoError;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Conflict(String),
    #[error("Uploaded file is too large")]
    PayloadTooLarge,
    #[error("Only image uploads are accepted")]
    UnsupportedMediaType,
    #[error("Too many requests. Please slow down")]
    TooManyRequests,
    #[error("Unable to complete the request. Please try again")]
    Persistence,
    #[error("An unexpected error occurred")]
    Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("Not found".into()),
            RepoError::Conflict => ApiError::Conflict("Conflict".into()),
            RepoError::Unavailable(detail) => {
                tracing::error!("persistence failure: {detail}");
                ApiError::Persistence
            }
            RepoError::Internal(detail) => {
                tracing::error!("repository internal error: {detail}");
                ApiError::Internal
            }
        }
    }
}

/// Map `RepoError::NotFound` to a 404 with an entity-specific message.
pub fn or_not_found(message: &'static str) -> impl FnOnce(RepoError) -> ApiError {
    move |e| match e {
        RepoError::NotFound => ApiError::NotFound(message.into()),
        other => other.into(),
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Persistence => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::failure(self.to_string()))
    }
}

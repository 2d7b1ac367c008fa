use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use super::{client_ip, AppState};
use crate::auth::{dummy_password_hash, hash_password, session_token, verify_password, Auth, AuthContext, SESSION_COOKIE};
use crate::error::{or_not_found, ApiError};
use crate::models::{ApiResponse, NewUser, User};
use crate::repo::RepoError;
use crate::validation::{LoginPayload, RegisterPayload};

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Opaque session token; send as `Authorization: Bearer <token>`.
    pub token: String,
    pub user: User,
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(state.config.session_ttl.as_secs()).unwrap_or(i64::MAX));
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(max_age)
        .finish()
}

#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin role requested by a non-bootstrap email"),
        (status = 409, description = "Email already exists"),
        (status = 429, description = "Too many registrations from this address")
    ),
    tag = "auth"
)]
pub async fn register(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<RegisterPayload>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_register(&client_ip(&req)) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let reg = payload.validate(&data.config.bootstrap_admin_emails)?;
    let password = reg.password;
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!("hashing task failed: {e}");
            ApiError::Internal
        })?
        .map_err(|e| {
            tracing::error!("password hashing failed: {e}");
            ApiError::Internal
        })?;

    let new = NewUser { name: reg.name, email: reg.email, password_hash, role: reg.role, phone: reg.phone };
    let user = data.repo.create_user(new).await.map_err(|e| match e {
        RepoError::Conflict => ApiError::Conflict("Email already exists".into()),
        other => other.into(),
    })?;
    tracing::info!(user_id = user.id, role = %user.role, "user registered");
    Ok(HttpResponse::Created().json(ApiResponse::ok("User was created", user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Session opened; token also set as a cookie", body = LoginResponse),
        (status = 400, description = "Email and password are required"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "auth"
)]
pub async fn login(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_login(&client_ip(&req)) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let (email, password) = payload.credentials()?;
    let invalid = || ApiError::Unauthenticated("Invalid email or password".into());

    let user = data.repo.find_user_by_email(&email).await?;
    let password = password.to_string();
    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let verified = web::block(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => verify_password(&password, dummy_password_hash()),
    })
    .await
    .map_err(|e| {
        tracing::error!("verification task failed: {e}");
        ApiError::Internal
    })?;
    let user = match user {
        Some(user) if verified => user,
        Some(user) => {
            tracing::info!(user_id = user.id, "login rejected");
            return Err(invalid());
        }
        None => return Err(invalid()),
    };

    let token = data.sessions.open(AuthContext { user_id: user.id, role: user.role });
    tracing::info!(user_id = user.id, "login");
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&data, token.clone()))
        .json(ApiResponse::ok("Login successful", LoginResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 200, description = "Session revoked"),
        (status = 401, description = "Not logged in")
    ),
    tag = "auth"
)]
pub async fn logout(req: HttpRequest, auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    if let Some(token) = session_token(&req, &mut Payload::None) {
        data.sessions.revoke(&token);
    }
    tracing::info!(user_id = auth.0.user_id, "logout");
    let mut resp = HttpResponse::Ok().json(ApiResponse::message("Logged out"));
    let removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    if let Err(e) = resp.add_removal_cookie(&removal) {
        tracing::warn!("could not clear session cookie: {e}");
    }
    Ok(resp)
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not logged in")
    ),
    tag = "auth"
)]
pub async fn me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = data.repo.get_user(auth.0.user_id).await.map_err(or_not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("User retrieved successfully", user)))
}

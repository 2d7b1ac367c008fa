use std::fmt;
use std::future::{ready, Ready};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Id;
use crate::routes::AppState;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "bf_session";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Owner,
    Service,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Owner => "owner",
            Role::Service => "service",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "owner" => Ok(Role::Owner),
            "service" => Ok(Role::Service),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Identity resolved from a session token; the only auth state handlers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Id,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ---------------- Passwords -------------------------------------------

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Hash checked when a login names an unknown email, so both paths pay for
/// one argon2 verification.
pub fn dummy_password_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("boardfinder-unknown-account").unwrap_or_default())
}

/// False for a wrong password and for an unparsable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash unreadable: {e}");
            false
        }
    }
}

// ---------------- Sessions --------------------------------------------

pub trait SessionStore: Send + Sync {
    /// Open a session and return its opaque token.
    fn open(&self, ctx: AuthContext) -> String;
    fn resolve(&self, token: &str) -> Option<AuthContext>;
    fn revoke(&self, token: &str);
    /// Drop every session held by a user (account deletion).
    fn revoke_user(&self, user_id: Id);
}

struct Session {
    ctx: AuthContext,
    expires_at: DateTime<Utc>,
}

/// Process-local session table.
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: chrono::Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24)),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn purge_expired(&self, now: DateTime<Utc>) {
        self.sessions.retain(|_, s| s.expires_at > now);
    }
}

impl SessionStore for InMemorySessionStore {
    fn open(&self, ctx: AuthContext) -> String {
        let now = Utc::now();
        self.purge_expired(now);
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), Session { ctx, expires_at: now + self.ttl });
        token
    }

    fn resolve(&self, token: &str) -> Option<AuthContext> {
        // copy out before removing so no shard guard is held across the remove
        let found = self.sessions.get(token).map(|s| (s.ctx, s.expires_at));
        match found {
            Some((ctx, expires_at)) if expires_at > Utc::now() => Some(ctx),
            Some(_) => {
                self.sessions.remove(token);
                None
            }
            None => None,
        }
    }

    fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }

    fn revoke_user(&self, user_id: Id) {
        self.sessions.retain(|_, s| s.ctx.user_id != user_id);
    }
}

// ---------------- Extractor -------------------------------------------

/// Extractor yielding the caller's `AuthContext`; 401 without a live session.
pub struct Auth(pub AuthContext);

/// Bearer header first, then the session cookie.
pub fn session_token(req: &HttpRequest, pl: &mut Payload) -> Option<String> {
    if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
        return Some(bearer.token().to_string());
    }
    req.cookie(SESSION_COOKIE).map(|c| c.value().to_string())
}

fn authenticate(req: &HttpRequest, pl: &mut Payload) -> Result<Auth, ApiError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        tracing::error!("AppState missing from app data");
        ApiError::Internal
    })?;
    let token = session_token(req, pl)
        .ok_or_else(|| ApiError::Unauthenticated("Unauthorized. Please login to continue".into()))?;
    state
        .sessions
        .resolve(&token)
        .map(Auth)
        .ok_or_else(|| ApiError::Unauthenticated("Session expired or invalid. Please login again".into()))
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        ready(authenticate(req, pl))
    }
}

/// Helper macro for role-guarding handlers.
#[macro_export]
macro_rules! require_role {
    ($auth:expr, $role:pat) => {
        $crate::require_role!($auth, $role, "Forbidden. Insufficient role")
    };
    ($auth:expr, $role:pat, $msg:expr) => {
        if !matches!($auth.0.role, $role) {
            return Err($crate::error::ApiError::Forbidden(($msg).into()));
        }
    };
}

//! Process configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub upload_dir: PathBuf,
    pub frontend_url: Option<String>,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub require_listing_approval: bool,
    /// Lowercased addresses allowed to register with the admin role.
    pub bootstrap_admin_emails: Vec<String>,
    pub max_upload_bytes: usize,
    pub max_images_per_upload: usize,
    pub enable_hsts: bool,
    pub rate_limit_enabled: bool,
    pub rate_limits: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 5,
            run_migrations: true,
            upload_dir: PathBuf::from("uploads"),
            frontend_url: None,
            session_ttl: Duration::from_secs(24 * 3600),
            cookie_secure: false,
            require_listing_approval: false,
            bootstrap_admin_emails: Vec::new(),
            max_upload_bytes: 10 * 1024 * 1024,
            max_images_per_upload: 10,
            enable_hsts: false,
            rate_limit_enabled: true,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

fn flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
    }
}

pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()).collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let database_url = var("DATABASE_URL");
        let store_backend = match var("STORE_BACKEND").map(|v| v.to_ascii_lowercase()) {
            None if cfg!(feature = "postgres-store") => StoreBackend::Postgres,
            None => StoreBackend::Memory,
            Some(v) if v == "postgres" => StoreBackend::Postgres,
            Some(v) if v == "memory" => StoreBackend::Memory,
            Some(v) => return Err(ConfigError::Invalid { name: "STORE_BACKEND", value: v }),
        };
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        let session_hours: u64 = parsed("SESSION_TTL_HOURS", 24)?;
        if session_hours == 0 {
            return Err(ConfigError::Invalid { name: "SESSION_TTL_HOURS", value: "0".into() });
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(d.bind_addr),
            port: parsed("PORT", d.port)?,
            store_backend,
            database_url,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", d.db_max_connections)?,
            run_migrations: flag("RUN_MIGRATIONS", d.run_migrations)?,
            upload_dir: var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(d.upload_dir),
            frontend_url: var("FRONTEND_URL"),
            session_ttl: Duration::from_secs(session_hours * 3600),
            cookie_secure: flag("COOKIE_SECURE", d.cookie_secure)?,
            require_listing_approval: flag("REQUIRE_LISTING_APPROVAL", d.require_listing_approval)?,
            bootstrap_admin_emails: var("BOOTSTRAP_ADMIN_EMAILS").as_deref().map(parse_email_list).unwrap_or_default(),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", d.max_upload_bytes)?,
            max_images_per_upload: parsed("MAX_IMAGES_PER_UPLOAD", d.max_images_per_upload)?,
            enable_hsts: flag("ENABLE_HSTS", d.enable_hsts)?,
            rate_limit_enabled: flag("RATE_LIMIT_ENABLED", d.rate_limit_enabled)?,
            rate_limits: RateLimitConfig::from_env(),
        })
    }

    pub fn listen_addr(&self) -> (String, u16) {
        (self.bind_addr.clone(), self.port)
    }
}

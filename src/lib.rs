pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod openapi;
pub mod rate_limit;
pub mod repo;
pub mod routes;
pub mod search;
pub mod security;
pub mod storage;
pub mod validation;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::AppState;
pub use security::SecurityHeaders;

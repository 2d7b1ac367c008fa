use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::Id;

/// Sliding-window limiter keyed by action and caller, local to the process.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Records the attempt and returns false once `limit` attempts already
    /// fall inside `window`.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    pub login_limit: usize,
    pub login_window: Duration,
    pub register_limit: usize,
    pub register_window: Duration,
    pub upload_limit: usize,
    pub upload_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_limit: 10,
            login_window: Duration::from_secs(60),
            register_limit: 5,
            register_window: Duration::from_secs(3600),
            upload_limit: 30,
            upload_window: Duration::from_secs(3600),
        }
    }
}

impl RateLimitConfig {
    /// Limits from `RL_*` variables; unset or unparsable values keep defaults.
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn dur_env(name: &str, default: Duration) -> Duration {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default)
        }
        let d = Self::default();
        Self {
            login_limit: usize_env("RL_LOGIN_LIMIT", d.login_limit),
            login_window: dur_env("RL_LOGIN_WINDOW", d.login_window),
            register_limit: usize_env("RL_REGISTER_LIMIT", d.register_limit),
            register_window: dur_env("RL_REGISTER_WINDOW", d.register_window),
            upload_limit: usize_env("RL_UPLOAD_LIMIT", d.upload_limit),
            upload_window: dur_env("RL_UPLOAD_WINDOW", d.upload_window),
        }
    }
}

/// Per-action guard used by handlers.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self {
        Self { limiter, cfg }
    }

    pub fn allow_login(&self, ip: &str) -> bool {
        self.limiter.check(&format!("login:{ip}"), self.cfg.login_limit, self.cfg.login_window)
    }

    pub fn allow_register(&self, ip: &str) -> bool {
        self.limiter.check(&format!("register:{ip}"), self.cfg.register_limit, self.cfg.register_window)
    }

    /// Uploads are keyed by account, not address.
    pub fn allow_upload(&self, user_id: Id) -> bool {
        self.limiter.check(&format!("upload:{user_id}"), self.cfg.upload_limit, self.cfg.upload_window)
    }
}

//! Client configuration.
//!
//! Values come from explicit setters first, then the environment (and a
//! `.env` file if present), then built-in defaults.

use std::env;
use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::query::EncodeMode;

pub const AUTH_ENV: &str = "FINVIZ_API_KEY";
pub const BASE_URL_ENV: &str = "FINVIZ_BASE_URL";
pub const RATE_LIMIT_ENV: &str = "FINVIZ_RATE_LIMIT_MS";

pub const DEFAULT_BASE_URL: &str = "https://elite.finviz.com";
const EXPORT_PATH: &str = "export.ashx";

#[derive(Clone)]
pub struct ClientConfig {
    pub auth_token: Option<String>,
    pub base_url: String,
    /// Minimum delay between two requests.
    pub rate_limit: Duration,
    /// Attempts per request, first one included.
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff_base * 2^n`.
    pub backoff_base: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub encode_mode: EncodeMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: Duration::from_secs(1),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            encode_mode: EncodeMode::Lenient,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .field("timeout", &self.timeout)
            .field("encode_mode", &self.encode_mode)
            .finish()
    }
}

impl ClientConfig {
    /// Defaults overlaid with `FINVIZ_*` environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::default().with_env_values(
            env::var(AUTH_ENV).ok(),
            env::var(BASE_URL_ENV).ok(),
            env::var(RATE_LIMIT_ENV).ok(),
        )
    }

    fn with_env_values(
        mut self,
        auth: Option<String>,
        base_url: Option<String>,
        rate_limit_ms: Option<String>,
    ) -> Self {
        if let Some(token) = auth.filter(|t| !t.trim().is_empty()) {
            self.auth_token = Some(token.trim().to_string());
        }
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(raw) = rate_limit_ms {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.rate_limit = Duration::from_millis(ms),
                Err(_) => warn!(var = RATE_LIMIT_ENV, value = %raw, "ignoring invalid rate limit"),
            }
        }
        self
    }

    /// Explicit token; `None` keeps whatever is already set.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.auth_token = Some(token.trim().to_string());
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_base = backoff_base;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_encode_mode(mut self, mode: EncodeMode) -> Self {
        self.encode_mode = mode;
        self
    }

    /// `<base>/export.ashx`
    pub fn export_url(&self) -> String {
        format!("{}/{EXPORT_PATH}", self.base_url.trim_end_matches('/'))
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

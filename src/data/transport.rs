//! HTTP transport: rate limiting, retry with exponential backoff and
//! response classification.
//!
//! Only network-level failures (and 5xx/429 answers) are retried. A body
//! that turns out to be an HTML page or empty is classified, logged, and
//! handed back as such; it is never retried and never an error.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use super::config::ClientConfig;
use crate::error::{Result, ScreenerError};

/// Classified response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Delimited text with a header row.
    Tabular(String),
    /// Blank body.
    Empty,
    /// An HTML document: rejected credentials or parameters.
    ErrorPage,
}

impl Payload {
    pub fn classify(body: String) -> Self {
        let trimmed = body.trim_start();
        if trimmed.is_empty() {
            return Payload::Empty;
        }
        if starts_with_ignore_case(trimmed, "<!doctype html") || starts_with_ignore_case(trimmed, "<html") {
            return Payload::ErrorPage;
        }
        Payload::Tabular(body)
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Payload::Tabular(text) => Some(text),
            Payload::Empty | Payload::ErrorPage => None,
        }
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Something that can execute one GET against the export endpoint.
pub trait Transport {
    fn get(&self, url: &str, params: &[(&'static str, String)]) -> Result<Payload>;
}

enum AttemptError {
    Transient(String),
    Fatal(ScreenerError),
}

/// Blocking reqwest transport.
///
/// One instance per caller; the rate-limit clock is shared by every request
/// issued through it.
pub struct HttpTransport {
    client: Client,
    rate_limit: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("finviz-screener/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScreenerError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            rate_limit: config.rate_limit,
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base,
            last_request: Mutex::new(None),
        })
    }

    /// Sleeps until at least `rate_limit` has passed since the previous request.
    fn throttle(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.rate_limit {
                let wait = self.rate_limit - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limiting");
                thread::sleep(wait);
            }
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn attempt(&self, url: &str, params: &[(&'static str, String)]) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .map_err(|e| AttemptError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Transient(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(ScreenerError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        response
            .text()
            .map_err(|e| AttemptError::Transient(format!("Failed to read response: {e}")))
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, params: &[(&'static str, String)]) -> Result<Payload> {
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            self.throttle();
            debug!(url, attempt = attempt + 1, "GET");

            match self.attempt(url, params) {
                Ok(body) => {
                    let payload = Payload::classify(body);
                    match &payload {
                        Payload::ErrorPage => error!(
                            url,
                            "Received HTML instead of CSV; the API key or the query parameters were rejected"
                        ),
                        Payload::Empty => warn!(url, "Received an empty body"),
                        Payload::Tabular(text) => debug!(url, bytes = text.len(), "Received tabular payload"),
                    }
                    return Ok(payload);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient(message)) => {
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %message,
                        "request failed"
                    );
                    last_error = message;
                    if attempt + 1 < self.max_attempts {
                        thread::sleep(self.backoff(attempt));
                    }
                }
            }
        }

        Err(ScreenerError::Transport {
            url: url.to_string(),
            attempts: self.max_attempts,
            message: last_error,
        })
    }
}

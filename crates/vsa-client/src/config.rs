//! Client configuration.

use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Status polling cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status queries
    pub interval: Duration,
    /// Status queries before giving up (60 × 5 s ≈ 5 minutes)
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Secret sent as `Authorization: Bearer <key>`
    pub api_key: String,
    pub poll: PollConfig,
    /// Per-request timeout; `None` leaves requests unbounded
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            poll: PollConfig::default(),
            request_timeout: Some(Duration::from_secs(120)),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let base_url = std::env::var("VSA_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let api_key = std::env::var("VSA_API_KEY")
            .map_err(|_| ClientError::config("VSA_API_KEY not set"))?;

        let defaults = PollConfig::default();
        let poll = PollConfig {
            interval: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            max_attempts: std::env::var("POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts),
        };

        Ok(Self {
            poll,
            ..Self::new(base_url, api_key)
        })
    }
}

//! Target configuration
//!
//! Endpoint address and credential for the RAG API server under test,
//! read from the same environment variables the server and its adapter
//! are deployed with.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HttpAdapterError, Result};

pub const ENV_API_URL: &str = "LIGHTRAG_API_URL";
pub const ENV_API_KEY: &str = "LIGHTRAG_API_KEY";
pub const ENV_TIMEOUT_MS: &str = "RAGDIAG_TIMEOUT_MS";
pub const ENV_RETRIES: &str = "RAGDIAG_RETRIES";

pub const DEFAULT_API_URL: &str = "http://localhost:9621";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_QUERY: &str = "ping";
pub const DEFAULT_QUERY_MODE: &str = "naive";

/// Upper bound on liveness retries.
pub const MAX_RETRIES: u32 = 10;

/// Target configuration
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Base URL of the RAG API server
    pub base_url: String,
    /// API key the calling layer presents (`X-API-Key`)
    pub api_key: Option<String>,
    /// Per-request bound in milliseconds
    pub timeout_ms: u64,
    /// Retries for the liveness probe before declaring it failed
    pub retries: u32,
    /// Attach the API key (when one is configured) to `/health`, which the
    /// server guards with the same dependency as its query routes
    pub health_uses_credential: bool,
    /// Check the unauthenticated `/auth-status` endpoint before `/health`
    pub check_auth_status: bool,
    /// Text sent by the authenticated query probe
    pub query_text: String,
    /// Retrieval mode for the query probe
    pub query_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("retries", &self.retries)
            .field("health_uses_credential", &self.health_uses_credential)
            .field("check_auth_status", &self.check_auth_status)
            .field("query_text", &self.query_text)
            .field("query_mode", &self.query_mode)
            .finish()
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: 0,
            health_uses_credential: true,
            check_auth_status: true,
            query_text: DEFAULT_QUERY.to_string(),
            query_mode: DEFAULT_QUERY_MODE.to_string(),
        }
    }
}

impl TargetConfig {
    /// Create config for a specific server
    pub fn new(base_url: &str) -> Self {
        TargetConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    /// Read configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = TargetConfig::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.base_url = url;
        }
        config.api_key = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty());

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = raw.trim().parse().map_err(|_| {
                HttpAdapterError::InvalidConfig(format!("{} must be an integer, got '{}'", ENV_TIMEOUT_MS, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_RETRIES) {
            config.retries = raw.trim().parse().map_err(|_| {
                HttpAdapterError::InvalidConfig(format!("{} must be an integer, got '{}'", ENV_RETRIES, raw))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the API key; a blank key clears it
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string()).filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_health_credential(mut self, send: bool) -> Self {
        self.health_uses_credential = send;
        self
    }

    pub fn with_auth_status_check(mut self, check: bool) -> Self {
        self.check_auth_status = check;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check that the URL is absolute http(s), the timeout is non-zero and
    /// the retry count is bounded
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            HttpAdapterError::InvalidConfig(format!("invalid base URL '{}': {}", self.base_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(HttpAdapterError::InvalidConfig(format!(
                "unsupported URL scheme '{}'",
                url.scheme()
            )));
        }

        if self.timeout_ms == 0 {
            return Err(HttpAdapterError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }

        if self.retries > MAX_RETRIES {
            return Err(HttpAdapterError::InvalidConfig(format!(
                "retries must be at most {}, got {}",
                MAX_RETRIES, self.retries
            )));
        }

        Ok(())
    }
}

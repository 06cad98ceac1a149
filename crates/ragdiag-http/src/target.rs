//! The system under test: base URL, credential and a shared HTTP client.

use std::fmt;

use crate::config::TargetConfig;
use crate::error::Result;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// HTTP target handed to every probe in a diagnosis run.
#[derive(Clone)]
pub struct HttpTarget {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl fmt::Debug for HttpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTarget")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl HttpTarget {
    /// Build a target from validated configuration.
    ///
    /// The client sets no timeouts of its own. Every request, connect phase
    /// included, is bounded by the engine's per-probe timeout, so a host that
    /// silently drops packets surfaces as a timed-out probe.
    pub fn new(config: &TargetConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("ragdiag/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpTarget {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Absolute URL for an API path such as `/health`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Attach the API key header, if one is configured.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }
}

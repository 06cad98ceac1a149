//! Concrete probes against a RAG API server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ragdiag_core::error::{ProbeError, ProbeOutcome};
use ragdiag_core::{DynProbe, Probe, ProbeResult, RetryPolicy, RetryProbe, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::classify::{authenticated_failure, snippet, transport_failure};
use crate::config::TargetConfig;
use crate::target::HttpTarget;

pub const AUTH_STATUS_PATH: &str = "/auth-status";
pub const HEALTH_PATH: &str = "/health";
pub const QUERY_PATH: &str = "/query";

pub const AUTH_STATUS_PROBE: &str = "auth-status";
pub const HEALTH_PROBE: &str = "health";
pub const QUERY_PROBE: &str = "authenticated-query";

/// Backoff base between liveness retries.
const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct HealthPayload {
    status: String,
}

#[derive(Debug, Deserialize)]
struct AuthStatusPayload {
    auth_mode: Option<String>,
    auth_configured: Option<bool>,
    api_version: Option<serde_json::Value>,
}

impl AuthStatusPayload {
    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(mode) = &self.auth_mode {
            parts.push(format!("auth_mode={}", mode));
        }
        if let Some(configured) = self.auth_configured {
            parts.push(format!("auth_configured={}", configured));
        }
        if let Some(version) = &self.api_version {
            let version = version
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| version.to_string());
            parts.push(format!("api_version={}", version));
        }
        parts.join(" ")
    }
}

/// `GET /auth-status`, never authenticated.
///
/// The server exposes this route outside its API-key dependency, so it
/// answers even when `/health` is credential-gated. Any response other than a
/// 2xx or a 404 (older servers without the route) is a liveness failure.
#[derive(Debug, Clone, Default)]
pub struct AuthStatusProbe {
    timeout: Option<Duration>,
}

impl AuthStatusProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Probe<HttpTarget> for AuthStatusProbe {
    fn name(&self) -> &str {
        AUTH_STATUS_PROBE
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn invoke(&self, target: &HttpTarget) -> ProbeOutcome {
        let url = target.url(AUTH_STATUS_PATH);
        debug!(url = %url, "Checking auth status");

        let response = match target.client().get(&url).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(ProbeResult::success(format!(
                "server answered 404 on {}; route not served by this version",
                AUTH_STATUS_PATH
            )));
        }
        if !status.is_success() {
            return Ok(ProbeResult::failure(
                StatusCode::Http(status.as_u16()),
                snippet(&body),
            ));
        }

        let detail = serde_json::from_str::<AuthStatusPayload>(&body)
            .map(|payload| payload.summary())
            .ok()
            .filter(|summary| !summary.is_empty())
            .unwrap_or_else(|| snippet(&body));
        Ok(ProbeResult::success(detail))
    }
}

/// `GET /health`, with the API key attached when configured to.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    send_credential: bool,
    timeout: Option<Duration>,
}

impl HealthProbe {
    pub fn new() -> Self {
        Self {
            send_credential: false,
            timeout: None,
        }
    }

    /// Attach the API key, for deployments whose liveness endpoint is
    /// credential-gated.
    pub fn with_credential(mut self, send: bool) -> Self {
        self.send_credential = send;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe<HttpTarget> for HealthProbe {
    fn name(&self) -> &str {
        HEALTH_PROBE
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn invoke(&self, target: &HttpTarget) -> ProbeOutcome {
        let url = target.url(HEALTH_PATH);
        debug!(url = %url, with_credential = self.send_credential, "Checking liveness");

        let mut request = target.client().get(&url);
        if self.send_credential {
            request = target.authorize(request);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Ok(ProbeResult::failure(
                StatusCode::Http(status.as_u16()),
                snippet(&body),
            ));
        }

        // Non-JSON 2xx bodies count as alive; a JSON body must say healthy.
        match serde_json::from_str::<HealthPayload>(&body) {
            Ok(payload) if payload.status != "healthy" => Ok(ProbeResult::failure(
                StatusCode::Symbolic("unhealthy".to_string()),
                snippet(&body),
            )),
            _ => Ok(ProbeResult::success(snippet(&body))),
        }
    }
}

/// `POST /query` with the caller's credential.
///
/// Succeeds only when the target accepts the caller's key and completes a
/// query through its downstream model provider.
#[derive(Debug, Clone)]
pub struct QueryProbe {
    query: String,
    mode: String,
    timeout: Option<Duration>,
}

impl QueryProbe {
    pub fn new(query: &str, mode: &str) -> Self {
        Self {
            query: query.to_string(),
            mode: mode.to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Probe<HttpTarget> for QueryProbe {
    fn name(&self) -> &str {
        QUERY_PROBE
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn invoke(&self, target: &HttpTarget) -> ProbeOutcome {
        let url = target.url(QUERY_PATH);
        debug!(url = %url, mode = %self.mode, with_credential = target.has_api_key(), "Issuing authenticated query");

        let request = target
            .client()
            .post(&url)
            .json(&json!({ "query": self.query, "mode": self.mode }));

        let response = match target.authorize(request).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(ProbeResult::success(snippet(&body)))
        } else {
            Ok(authenticated_failure(status.as_u16(), &body))
        }
    }
}

fn health_probe(config: &TargetConfig) -> HealthProbe {
    HealthProbe::new()
        .with_credential(config.health_uses_credential)
        .with_timeout(config.timeout())
}

fn with_retries<P>(probe: P, config: &TargetConfig) -> DynProbe<HttpTarget>
where
    P: Probe<HttpTarget> + 'static,
{
    if config.retries > 0 {
        Arc::new(RetryProbe::new(
            probe,
            RetryPolicy::new(config.retries, RETRY_BACKOFF_MS),
        ))
    } else {
        Arc::new(probe)
    }
}

/// The first probe for `config`: `/auth-status` when enabled, otherwise
/// `/health`. Retry-wrapped when retries are set.
pub fn liveness_probe(config: &TargetConfig) -> DynProbe<HttpTarget> {
    if config.check_auth_status {
        with_retries(AuthStatusProbe::new().with_timeout(config.timeout()), config)
    } else {
        with_retries(health_probe(config), config)
    }
}

/// Every probe up to and including `/health`.
pub fn liveness_probes(config: &TargetConfig) -> Vec<DynProbe<HttpTarget>> {
    let mut probes = vec![liveness_probe(config)];
    if config.check_auth_status {
        probes.push(Arc::new(health_probe(config)));
    }
    probes
}

/// Liveness stage first, then the authenticated query.
pub fn default_probes(config: &TargetConfig) -> Vec<DynProbe<HttpTarget>> {
    let query = QueryProbe::new(&config.query_text, &config.query_mode).with_timeout(config.timeout());
    let mut probes = liveness_probes(config);
    probes.push(Arc::new(query));
    probes
}

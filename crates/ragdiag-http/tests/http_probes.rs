//! Integration tests for the HTTP probes against an in-process fake RAG
//! API server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode as HttpStatus};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ragdiag_core::remediation::LIVENESS_TIMED_OUT;
use ragdiag_core::{DiagnosticEngine, EngineConfig, FaultDomain, Probe, StatusCode};
use ragdiag_http::probes::{AUTH_STATUS_PROBE, HEALTH_PROBE, QUERY_PROBE};
use ragdiag_http::{
    default_probes, AuthStatusProbe, HealthProbe, HttpTarget, QueryProbe, TargetConfig,
};
use serde_json::{json, Value};

/// Behaviour of the fake backend.
#[derive(Clone)]
struct Backend {
    /// Key the backend expects in `X-API-Key`; `None` disables auth.
    api_key: Option<String>,
    /// Require the key on `/health` too, as the real server does.
    health_gated: bool,
    /// Value of `status` in the health payload.
    health_status: &'static str,
    /// Serve `/auth-status`; older servers answer 404.
    auth_status_served: bool,
    /// Simulate the downstream model provider rejecting the backend's key.
    provider_key_revoked: bool,
    /// Stall `/auth-status` before answering.
    auth_status_delay: Option<Duration>,
    /// Stall `/query` before answering.
    query_delay: Option<Duration>,
    /// Count of `/health` requests served.
    health_checks: Arc<AtomicU32>,
    /// Count of `/query` requests served.
    queries: Arc<AtomicU32>,
}

impl Backend {
    fn new() -> Self {
        Backend {
            api_key: Some("correct-key".to_string()),
            health_gated: true,
            health_status: "healthy",
            auth_status_served: true,
            provider_key_revoked: false,
            auth_status_delay: None,
            query_delay: None,
            health_checks: Arc::new(AtomicU32::new(0)),
            queries: Arc::new(AtomicU32::new(0)),
        }
    }

    fn key_ok(&self, headers: &HeaderMap) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected),
        }
    }
}

async fn stall(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

async fn auth_status(State(backend): State<Backend>) -> impl IntoResponse {
    stall(backend.auth_status_delay).await;
    if !backend.auth_status_served {
        return (HttpStatus::NOT_FOUND, Json(json!({"detail": "Not Found"})));
    }
    (
        HttpStatus::OK,
        Json(json!({
            "auth_configured": false,
            "auth_mode": "disabled",
            "core_version": "1.3.0",
            "api_version": "0173"
        })),
    )
}

async fn health(State(backend): State<Backend>, headers: HeaderMap) -> impl IntoResponse {
    backend.health_checks.fetch_add(1, Ordering::SeqCst);

    if backend.health_gated && !backend.key_ok(&headers) {
        return (HttpStatus::FORBIDDEN, Json(json!({"detail": "Invalid API Key"})));
    }
    (
        HttpStatus::OK,
        Json(json!({
            "status": backend.health_status,
            "services": {"database": "ok", "llm": "ok"}
        })),
    )
}

async fn query(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    backend.queries.fetch_add(1, Ordering::SeqCst);
    stall(backend.query_delay).await;

    if !backend.key_ok(&headers) {
        return (HttpStatus::UNAUTHORIZED, Json(json!({"detail": "Invalid API Key"})));
    }
    if backend.provider_key_revoked {
        return (
            HttpStatus::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Error code: 401 - {'error': {'code': 'invalid_api_key'}}"})),
        );
    }
    (
        HttpStatus::OK,
        Json(json!({"response": format!("answer to {}", body["query"])})),
    )
}

async fn spawn_backend(backend: Backend) -> SocketAddr {
    let app = Router::new()
        .route("/auth-status", get(auth_status))
        .route("/health", get(health))
        .route("/query", post(query))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr) -> TargetConfig {
    TargetConfig::new(&format!("http://{}", addr)).with_timeout_ms(5_000)
}

fn engine() -> DiagnosticEngine {
    DiagnosticEngine::new(EngineConfig::default().with_probe_timeout(Duration::from_secs(5)))
}

/// Address with nothing listening on it.
async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_healthy_chain() {
    let addr = spawn_backend(Backend::new()).await;
    let config = config_for(addr).with_api_key("correct-key");
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Healthy);
    assert!(diagnosis.failed_probe.is_none());
    let names: Vec<&str> = diagnosis.trail.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec![AUTH_STATUS_PROBE, HEALTH_PROBE, QUERY_PROBE]);
}

#[tokio::test]
async fn test_wrong_key_on_gated_health_is_credential() {
    let backend = Backend::new();
    let queries = backend.queries.clone();
    let addr = spawn_backend(backend).await;
    let config = config_for(addr).with_api_key("stale-key");
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Credential);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(HEALTH_PROBE));
    assert_eq!(diagnosis.status_code, Some(StatusCode::Http(403)));
    assert_eq!(queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_key_on_gated_health_is_credential() {
    let addr = spawn_backend(Backend::new()).await;
    let config = config_for(addr);
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Credential);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(HEALTH_PROBE));
}

#[tokio::test]
async fn test_wrong_caller_key_on_open_health_fails_at_query() {
    let mut backend = Backend::new();
    backend.health_gated = false;
    let addr = spawn_backend(backend).await;
    let config = config_for(addr).with_api_key("stale-key");
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Credential);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(QUERY_PROBE));
    assert_eq!(diagnosis.status_code, Some(StatusCode::Http(401)));
    assert!(diagnosis.detail.unwrap().contains("caller's credential"));
}

#[tokio::test]
async fn test_revoked_provider_key_is_credential() {
    let mut backend = Backend::new();
    backend.provider_key_revoked = true;
    let addr = spawn_backend(backend).await;
    let config = config_for(addr).with_api_key("correct-key");
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Credential);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(QUERY_PROBE));
    assert!(diagnosis.detail.unwrap().contains("downstream provider"));
}

#[tokio::test]
async fn test_server_down_is_infrastructure_and_nothing_else_sent() {
    let addr = dead_addr().await;
    let config = config_for(addr).with_api_key("correct-key");
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Infrastructure);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(AUTH_STATUS_PROBE));
    assert_eq!(diagnosis.status_code, Some(StatusCode::ConnectionRefused));
    assert_eq!(diagnosis.trail.len(), 1);
}

#[tokio::test]
async fn test_unhealthy_payload_after_auth_status_is_unknown() {
    let mut backend = Backend::new();
    backend.health_status = "degraded";
    let queries = backend.queries.clone();
    let addr = spawn_backend(backend).await;
    let config = config_for(addr).with_api_key("correct-key");
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Unknown);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(HEALTH_PROBE));
    assert_eq!(
        diagnosis.status_code,
        Some(StatusCode::Symbolic("unhealthy".to_string()))
    );
    assert_eq!(queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unhealthy_payload_as_first_probe_is_infrastructure() {
    let mut backend = Backend::new();
    backend.health_status = "degraded";
    let addr = spawn_backend(backend).await;
    let config = config_for(addr)
        .with_api_key("correct-key")
        .with_auth_status_check(false);
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Infrastructure);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(HEALTH_PROBE));
}

#[tokio::test]
async fn test_gated_health_without_credential_flags_liveness_gate() {
    let addr = spawn_backend(Backend::new()).await;
    let config = config_for(addr)
        .with_api_key("correct-key")
        .with_auth_status_check(false)
        .with_health_credential(false);
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Infrastructure);
    assert!(diagnosis
        .remediation
        .iter()
        .any(|hint| hint.contains("credential-gated")));
}

#[tokio::test]
async fn test_server_without_auth_status_route_is_still_diagnosed() {
    let mut backend = Backend::new();
    backend.auth_status_served = false;
    let addr = spawn_backend(backend).await;
    let config = config_for(addr).with_api_key("correct-key");
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert!(diagnosis.is_healthy());
}

#[tokio::test]
async fn test_stalled_liveness_is_infrastructure_timeout() {
    let mut backend = Backend::new();
    backend.auth_status_delay = Some(Duration::from_secs(5));
    let health_checks = backend.health_checks.clone();
    let addr = spawn_backend(backend).await;
    let config = config_for(addr)
        .with_api_key("correct-key")
        .with_timeout_ms(200);
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Infrastructure);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(AUTH_STATUS_PROBE));
    assert!(diagnosis.timed_out);
    assert!(diagnosis.status_code.is_none());
    assert!(diagnosis
        .remediation
        .iter()
        .any(|hint| hint == LIVENESS_TIMED_OUT));
    assert_eq!(health_checks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stalled_query_is_unknown_timeout() {
    let mut backend = Backend::new();
    backend.query_delay = Some(Duration::from_secs(5));
    let addr = spawn_backend(backend).await;
    let config = config_for(addr)
        .with_api_key("correct-key")
        .with_timeout_ms(300);
    let target = HttpTarget::new(&config).unwrap();

    let diagnosis = engine()
        .diagnose(&target, &default_probes(&config))
        .await
        .unwrap();

    assert_eq!(diagnosis.fault_domain, FaultDomain::Unknown);
    assert_eq!(diagnosis.failed_probe.as_deref(), Some(QUERY_PROBE));
    assert!(diagnosis.timed_out);
    assert!(diagnosis.remediation.is_empty());
    assert!(diagnosis.detail.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_large_retry_count_does_not_panic() {
    let addr = spawn_backend(Backend::new()).await;
    let config = config_for(addr).with_api_key("correct-key");
    let target = HttpTarget::new(&config).unwrap();

    // Validation bounds retries, but probes built from an unchecked config
    // must still run.
    let probes = default_probes(&config.clone().with_retries(5000));
    let diagnosis = engine().diagnose(&target, &probes).await.unwrap();

    assert!(diagnosis.is_healthy());
}

#[tokio::test]
async fn test_auth_status_probe_reports_auth_mode() {
    let addr = spawn_backend(Backend::new()).await;
    let target = HttpTarget::new(&config_for(addr)).unwrap();

    let result = AuthStatusProbe::new().invoke(&target).await.unwrap();

    assert!(result.is_success());
    assert!(result.raw_detail.contains("auth_mode=disabled"));
    assert!(result.raw_detail.contains("api_version=0173"));
}

#[tokio::test]
async fn test_health_probe_standalone() {
    let mut backend = Backend::new();
    backend.health_gated = false;
    let addr = spawn_backend(backend).await;
    let target = HttpTarget::new(&config_for(addr)).unwrap();

    let result = HealthProbe::new().invoke(&target).await.unwrap();

    assert!(result.is_success());
    assert!(result.raw_detail.contains("healthy"));
}

#[tokio::test]
async fn test_query_probe_without_key_is_rejected() {
    let addr = spawn_backend(Backend::new()).await;
    let target = HttpTarget::new(&config_for(addr)).unwrap();

    let result = QueryProbe::new("ping", "naive").invoke(&target).await.unwrap();

    assert!(!result.is_success());
    assert_eq!(result.status_code, Some(StatusCode::Http(401)));
}

#[tokio::test]
async fn test_open_backend_accepts_query_without_key() {
    let mut backend = Backend::new();
    backend.api_key = None;
    let addr = spawn_backend(backend).await;
    let target = HttpTarget::new(&config_for(addr)).unwrap();

    let result = QueryProbe::new("what is in the graph?", "hybrid")
        .invoke(&target)
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(result.raw_detail.contains("what is in the graph?"));
}

//! HTTP target adapter for ragdiag.
//!
//! Supplies concrete probes for a RAG API server:
//! - [`AuthStatusProbe`]: unauthenticated `GET /auth-status` liveness check
//! - [`HealthProbe`]: `GET /health`, which the server guards with its API key
//! - [`QueryProbe`]: authenticated `POST /query`, which also exercises the
//!   server's own credential for its downstream model provider
//!
//! The credential travels in the `X-API-Key` header.

pub mod classify;
pub mod config;
pub mod error;
pub mod probes;
pub mod target;

pub use config::TargetConfig;
pub use error::{HttpAdapterError, Result};
pub use probes::{
    default_probes, liveness_probe, liveness_probes, AuthStatusProbe, HealthProbe, QueryProbe,
};
pub use target::HttpTarget;

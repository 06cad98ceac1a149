//! RAGDIAG Core Library
//!
//! Staged failure diagnosis for a multi-hop request chain
//! (client -> adapter server -> backend API -> downstream model provider).
//!
//! The [`DiagnosticEngine`] runs an ordered list of [`Probe`]s against a
//! target, stops at the first failure, and classifies it into a
//! [`FaultDomain`] with remediation hints.

pub mod controls;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod probe;
pub mod remediation;
pub mod state;
pub mod telemetry;

pub use controls::{RetryPolicy, RetryProbe};
pub use domain::{Diagnosis, FaultDomain, Outcome, ProbeRecord, ProbeResult, StatusCode};
pub use engine::{DiagnosticEngine, EngineConfig};
pub use error::{DiagnoseError, ProbeError};
pub use obs::{
    diagnosis_span, emit_diagnosis_cancelled, emit_diagnosis_finished, emit_diagnosis_started,
    emit_probe_finished, emit_probe_started,
};
pub use probe::{DynProbe, Probe};
pub use state::RunState;
pub use telemetry::init_tracing;

pub use tokio_util::sync::CancellationToken;

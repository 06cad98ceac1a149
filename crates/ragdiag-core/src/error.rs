//! Error types for diagnosis runs and probe invocations.

use thiserror::Error;

/// Engine-contract violations, rejected before any probe runs.
///
/// Ordinary probe failures are never errors; they are reported as data in a
/// [`crate::Diagnosis`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnoseError {
    #[error("probe sequence is empty")]
    EmptyProbeSequence,

    #[error("duplicate probe name: {0}")]
    DuplicateProbeName(String),

    #[error(transparent)]
    State(#[from] crate::state::InvalidTransition),
}

/// Errors a probe may raise instead of returning a Failure result.
///
/// The engine converts every variant into a Failure with no status code.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("probe panicked: {0}")]
    Panicked(String),
}

/// Result type for probe invocations.
pub type ProbeOutcome = std::result::Result<crate::domain::ProbeResult, ProbeError>;

//! Probe results and diagnosis records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single probe invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Numeric or symbolic status attached to a failed probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StatusCode {
    /// HTTP-style status code.
    Http(u16),

    /// The target refused or never accepted the connection.
    ConnectionRefused,

    /// Adapter-defined symbolic status (e.g. `unhealthy`).
    Symbolic(String),
}

impl StatusCode {
    /// Whether this status is one of the given authentication-style codes.
    pub fn is_auth_failure(&self, auth_codes: &[u16]) -> bool {
        matches!(self, StatusCode::Http(code) if auth_codes.contains(code))
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Http(code) => write!(f, "{}", code),
            StatusCode::ConnectionRefused => write!(f, "connection_refused"),
            StatusCode::Symbolic(s) => write!(f, "{}", s),
        }
    }
}

/// Result returned by one probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeResult {
    pub outcome: Outcome,

    /// Present when the outcome is a failure the adapter could classify.
    pub status_code: Option<StatusCode>,

    /// Free-form diagnostic text. Logged and surfaced, never parsed.
    pub raw_detail: String,
}

impl ProbeResult {
    pub fn success(raw_detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            status_code: None,
            raw_detail: raw_detail.into(),
        }
    }

    pub fn failure(status_code: StatusCode, raw_detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure,
            status_code: Some(status_code),
            raw_detail: raw_detail.into(),
        }
    }

    /// Failure with no status, used for raised errors and timeouts.
    pub fn failure_without_status(raw_detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure,
            status_code: None,
            raw_detail: raw_detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Coarse classification of where in the request chain a failure originates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FaultDomain {
    Infrastructure,
    Credential,
    Healthy,
    Unknown,
}

impl FaultDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultDomain::Infrastructure => "infrastructure",
            FaultDomain::Credential => "credential",
            FaultDomain::Healthy => "healthy",
            FaultDomain::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FaultDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed probe, as seen in a diagnosis trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeRecord {
    pub name: String,
    pub outcome: Outcome,
    pub status_code: Option<StatusCode>,
}

/// Final output of a diagnosis run. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnosis {
    pub fault_domain: FaultDomain,

    /// Probe that produced the terminal result; `None` when healthy.
    pub failed_probe: Option<String>,

    /// Ordered human-readable suggested actions.
    pub remediation: Vec<String>,

    /// Status of the terminal result, if any.
    pub status_code: Option<StatusCode>,

    /// Raw detail of the terminal result, for manual inspection.
    pub detail: Option<String>,

    /// The terminal probe exceeded its time bound.
    pub timed_out: bool,

    /// The run was cancelled before completion.
    pub cancelled: bool,

    /// Probes executed, in order. Timings are deliberately excluded.
    pub trail: Vec<ProbeRecord>,
}

impl Diagnosis {
    pub fn is_healthy(&self) -> bool {
        self.fault_domain == FaultDomain::Healthy
    }
}

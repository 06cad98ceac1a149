//! Structured observability hooks for diagnosis runs.
//!
//! Every run is wrapped in a `ragdiag.diagnosis` span tagged with a
//! `run_id`. Events carry an `event` field (`diagnosis.started`,
//! `probe.finished`, ...) so log pipelines can filter on it.

use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{Diagnosis, ProbeResult};

/// Span covering one diagnosis run.
///
/// Returned un-entered; attach it to the run future with
/// `tracing::Instrument` so it survives `.await` points.
pub fn diagnosis_span(run_id: &str, probe_count: usize) -> tracing::Span {
    tracing::info_span!("ragdiag.diagnosis", run_id = %run_id, probes = probe_count)
}

pub fn emit_diagnosis_started(run_id: &str, probe_names: &[&str]) {
    info!(
        event = "diagnosis.started",
        run_id = %run_id,
        probes = ?probe_names,
    );
}

pub fn emit_probe_started(probe: &str, index: usize, limit: Duration) {
    info!(
        event = "probe.started",
        probe = %probe,
        index = index,
        timeout_ms = limit.as_millis() as u64,
    );
}

/// Probe outcome. Failures are logged at warn with the raw detail.
pub fn emit_probe_finished(probe: &str, result: &ProbeResult, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    let status = result
        .status_code
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());

    if result.is_success() {
        info!(event = "probe.finished", probe = %probe, outcome = "success", elapsed_ms = elapsed_ms);
    } else {
        warn!(
            event = "probe.finished",
            probe = %probe,
            outcome = "failure",
            status = %status,
            elapsed_ms = elapsed_ms,
            detail = %result.raw_detail,
        );
    }
}

pub fn emit_diagnosis_finished(run_id: &str, diagnosis: &Diagnosis, elapsed: Duration) {
    info!(
        event = "diagnosis.finished",
        run_id = %run_id,
        fault_domain = %diagnosis.fault_domain,
        failed_probe = diagnosis.failed_probe.as_deref().unwrap_or("none"),
        timed_out = diagnosis.timed_out,
        elapsed_ms = elapsed.as_millis() as u64,
    );
}

pub fn emit_diagnosis_cancelled(run_id: &str, probe: &str) {
    warn!(event = "diagnosis.cancelled", run_id = %run_id, probe = %probe);
}

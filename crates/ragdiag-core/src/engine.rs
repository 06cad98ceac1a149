//! Diagnostic engine: ordered, short-circuiting probe execution and fault
//! classification.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::controls::{invoke_bounded, Invocation};
use crate::domain::{Diagnosis, FaultDomain, ProbeRecord, ProbeResult};
use crate::error::DiagnoseError;
use crate::obs;
use crate::probe::Probe;
use crate::remediation::{self, remediation_for};
use crate::state::{InvalidTransition, RunState};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound applied to probes that do not declare their own timeout.
    pub probe_timeout: Duration,

    /// HTTP-style codes classified as authentication failures.
    pub auth_status_codes: Vec<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            auth_status_codes: vec![401, 403],
        }
    }
}

impl EngineConfig {
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_auth_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.auth_status_codes = codes;
        self
    }
}

/// Runs probes strictly in order and stops at the first failure.
///
/// The engine holds no per-run state, so independent `diagnose` calls may
/// run concurrently on one engine.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticEngine {
    config: EngineConfig,
}

impl DiagnosticEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Diagnose `target` with `probes`, ordered from most fundamental
    /// (liveness) to most specific.
    ///
    /// Probe failures, raised errors, panics and timeouts are all reported
    /// in the returned [`Diagnosis`]. Only contract violations are errors.
    pub async fn diagnose<T, P>(&self, target: &T, probes: &[P]) -> Result<Diagnosis, DiagnoseError>
    where
        T: ?Sized + Sync,
        P: Probe<T>,
    {
        self.diagnose_with_cancel(target, probes, &CancellationToken::new())
            .await
    }

    /// Like [`diagnose`](Self::diagnose), abandoning the in-flight probe when
    /// `cancel` fires. A cancelled run yields `FaultDomain::Unknown`.
    pub async fn diagnose_with_cancel<T, P>(
        &self,
        target: &T,
        probes: &[P],
        cancel: &CancellationToken,
    ) -> Result<Diagnosis, DiagnoseError>
    where
        T: ?Sized + Sync,
        P: Probe<T>,
    {
        validate::<T, P>(probes)?;

        let run_id = Uuid::new_v4().to_string();
        let span = obs::diagnosis_span(&run_id, probes.len());
        self.run(target, probes, cancel, &run_id)
            .instrument(span)
            .await
    }

    /// Diagnose several independent targets concurrently with the same
    /// probe sequence. Results are returned in target order.
    pub async fn diagnose_all<T, P>(
        &self,
        targets: &[T],
        probes: &[P],
    ) -> Vec<Result<Diagnosis, DiagnoseError>>
    where
        T: Sync,
        P: Probe<T>,
    {
        join_all(targets.iter().map(|target| self.diagnose(target, probes))).await
    }

    async fn run<T, P>(
        &self,
        target: &T,
        probes: &[P],
        cancel: &CancellationToken,
        run_id: &str,
    ) -> Result<Diagnosis, DiagnoseError>
    where
        T: ?Sized + Sync,
        P: Probe<T>,
    {
        let started = Instant::now();
        let names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
        obs::emit_diagnosis_started(run_id, &names);

        let mut state = RunState::NotStarted;
        state.start()?;
        let mut trail: Vec<ProbeRecord> = Vec::with_capacity(probes.len());

        while let Some(index) = state.probe_index() {
            let Some(probe) = probes.get(index) else {
                state.terminate(healthy(trail))?;
                break;
            };

            let limit = probe.timeout().unwrap_or(self.config.probe_timeout);
            obs::emit_probe_started(probe.name(), index, limit);
            let probe_started = Instant::now();

            let invocation = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                invocation = invoke_bounded(probe, target, limit) => Some(invocation),
            };

            let Some(invocation) = invocation else {
                obs::emit_diagnosis_cancelled(run_id, probe.name());
                state.terminate(cancelled(probe.name(), trail))?;
                break;
            };

            let (result, timed_out) = match invocation {
                Invocation::Completed(result) => (result, false),
                Invocation::Raised(message) => (ProbeResult::failure_without_status(message), false),
                Invocation::TimedOut(limit) => (
                    ProbeResult::failure_without_status(format!(
                        "probe '{}' timed out after {}ms",
                        probe.name(),
                        limit.as_millis()
                    )),
                    true,
                ),
            };
            obs::emit_probe_finished(probe.name(), &result, probe_started.elapsed());

            trail.push(ProbeRecord {
                name: probe.name().to_string(),
                outcome: result.outcome,
                status_code: result.status_code.clone(),
            });

            if result.is_success() {
                state.advance()?;
            } else {
                let diagnosis = self.classify(index, probe.name(), result, timed_out, trail);
                state.terminate(diagnosis)?;
                break;
            }
        }

        let current = state.label();
        let diagnosis = state.into_diagnosis().ok_or(InvalidTransition {
            current,
            requested: "terminated".to_string(),
        })?;
        obs::emit_diagnosis_finished(run_id, &diagnosis, started.elapsed());
        Ok(diagnosis)
    }

    /// Translate the terminal failure into a fault domain.
    fn classify(
        &self,
        index: usize,
        probe_name: &str,
        result: ProbeResult,
        timed_out: bool,
        trail: Vec<ProbeRecord>,
    ) -> Diagnosis {
        let auth_failure = result
            .status_code
            .as_ref()
            .is_some_and(|s| s.is_auth_failure(&self.config.auth_status_codes));

        let (fault_domain, remediation) = if index == 0 {
            let mut hints = remediation_for(FaultDomain::Infrastructure);
            if auth_failure {
                hints.push(remediation::LIVENESS_CREDENTIAL_GATED.to_string());
            }
            if timed_out {
                hints.push(remediation::LIVENESS_TIMED_OUT.to_string());
            }
            (FaultDomain::Infrastructure, hints)
        } else if auth_failure {
            (FaultDomain::Credential, remediation_for(FaultDomain::Credential))
        } else {
            (FaultDomain::Unknown, Vec::new())
        };

        Diagnosis {
            fault_domain,
            failed_probe: Some(probe_name.to_string()),
            remediation,
            status_code: result.status_code,
            detail: Some(result.raw_detail),
            timed_out,
            cancelled: false,
            trail,
        }
    }
}

fn validate<T, P>(probes: &[P]) -> Result<(), DiagnoseError>
where
    T: ?Sized + Sync,
    P: Probe<T>,
{
    if probes.is_empty() {
        return Err(DiagnoseError::EmptyProbeSequence);
    }

    let mut seen = HashSet::new();
    for probe in probes {
        if !seen.insert(probe.name()) {
            return Err(DiagnoseError::DuplicateProbeName(probe.name().to_string()));
        }
    }
    Ok(())
}

fn healthy(trail: Vec<ProbeRecord>) -> Diagnosis {
    Diagnosis {
        fault_domain: FaultDomain::Healthy,
        failed_probe: None,
        remediation: Vec::new(),
        status_code: None,
        detail: None,
        timed_out: false,
        cancelled: false,
        trail,
    }
}

fn cancelled(probe_name: &str, trail: Vec<ProbeRecord>) -> Diagnosis {
    Diagnosis {
        fault_domain: FaultDomain::Unknown,
        failed_probe: Some(probe_name.to_string()),
        remediation: vec![remediation::RUN_CANCELLED.to_string()],
        status_code: None,
        detail: Some(format!("cancelled while running probe '{}'", probe_name)),
        timed_out: false,
        cancelled: true,
        trail,
    }
}

//! Presentation of a diagnosis for terminals and automation.

use chrono::{DateTime, Utc};
use ragdiag_core::{Diagnosis, FaultDomain, Outcome};
use serde::Serialize;

/// Exit code for a fault domain, so shell automation can branch on it.
pub fn exit_code(domain: FaultDomain) -> i32 {
    match domain {
        FaultDomain::Healthy => 0,
        FaultDomain::Infrastructure => 2,
        FaultDomain::Credential => 3,
        FaultDomain::Unknown => 4,
    }
}

/// A diagnosis plus run metadata, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub target: String,
    pub checked_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
}

impl DiagnosisReport {
    pub fn new(target: &str, elapsed_ms: u64, diagnosis: Diagnosis) -> Self {
        Self {
            target: target.to_string(),
            checked_at: Utc::now(),
            elapsed_ms,
            diagnosis,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let d = &self.diagnosis;
        let mut out = String::new();

        out.push_str(&format!("Target:       {}\n", self.target));
        out.push_str(&format!(
            "Fault domain: {}\n",
            d.fault_domain.as_str().to_uppercase()
        ));

        if let Some(probe) = &d.failed_probe {
            let mut line = format!("Failed probe: {}", probe);
            if let Some(status) = &d.status_code {
                line.push_str(&format!(" (status {})", status));
            }
            if d.timed_out {
                line.push_str(" (timed out)");
            }
            if d.cancelled {
                line.push_str(" (cancelled)");
            }
            out.push_str(&line);
            out.push('\n');
        }

        if let Some(detail) = d.detail.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("Detail:       {}\n", detail));
        }

        out.push_str(&format!("Duration:     {}ms\n", self.elapsed_ms));

        if !d.trail.is_empty() {
            out.push_str("\nProbes:\n");
            for record in &d.trail {
                let mark = match record.outcome {
                    Outcome::Success => "✓",
                    Outcome::Failure => "✗",
                };
                match &record.status_code {
                    Some(status) => out.push_str(&format!("  {} {} ({})\n", mark, record.name, status)),
                    None => out.push_str(&format!("  {} {}\n", mark, record.name)),
                }
            }
        }

        if !d.remediation.is_empty() {
            out.push_str("\nSuggested actions:\n");
            for (i, hint) in d.remediation.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, hint));
            }
        }

        out
    }
}

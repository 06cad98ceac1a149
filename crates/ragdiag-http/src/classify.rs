//! Mapping from HTTP exchanges to probe results.

use std::sync::OnceLock;

use ragdiag_core::error::{ProbeError, ProbeOutcome};
use ragdiag_core::{ProbeResult, StatusCode};
use regex::Regex;

/// Longest body excerpt kept in a probe's raw detail.
pub const MAX_DETAIL_CHARS: usize = 512;

/// Truncate a response body for logging.
pub fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_DETAIL_CHARS).collect();
    format!("{}...", cut)
}

/// Classify a request that never produced a response.
pub fn transport_failure(err: &reqwest::Error) -> ProbeOutcome {
    transport_outcome(err.is_timeout(), err.is_connect(), err.to_string())
}

// A connect timeout reports both flags; it is a silent drop, not a refusal.
fn transport_outcome(timed_out: bool, connect: bool, message: String) -> ProbeOutcome {
    if timed_out {
        Ok(ProbeResult::failure_without_status(format!(
            "request timed out: {}",
            message
        )))
    } else if connect {
        Ok(ProbeResult::failure(
            StatusCode::ConnectionRefused,
            format!("connection failed: {}", message),
        ))
    } else {
        Err(ProbeError::Transport(message))
    }
}

fn upstream_auth_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(\b401\b|unauthorized|invalid[_ ]api[_ ]key|incorrect api key|authentication[_ ]?error)",
        )
        .expect("upstream auth pattern is valid")
    })
}

/// Whether a server-error body reports that the downstream model provider
/// rejected the target's own credential.
pub fn is_upstream_auth_failure(body: &str) -> bool {
    upstream_auth_pattern().is_match(body)
}

/// Classify a non-2xx response from an authenticated endpoint.
///
/// A 5xx carrying a provider authentication error is reported as 401 with a
/// detail naming the downstream hop, since it is the same credential fault
/// one hop further along the chain.
pub fn authenticated_failure(status: u16, body: &str) -> ProbeResult {
    let excerpt = snippet(body);
    match status {
        401 | 403 => ProbeResult::failure(
            StatusCode::Http(status),
            format!("target rejected the caller's credential ({}): {}", status, excerpt),
        ),
        500..=599 if is_upstream_auth_failure(body) => ProbeResult::failure(
            StatusCode::Http(401),
            format!(
                "downstream provider rejected the target's credential (target returned {}): {}",
                status, excerpt
            ),
        ),
        _ => ProbeResult::failure(StatusCode::Http(status), excerpt),
    }
}

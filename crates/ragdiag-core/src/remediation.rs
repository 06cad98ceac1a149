//! Remediation hint table.
//!
//! Hints are ordered: cheapest and most likely first. The credential hints
//! cover both hops of the chain because a rejected key looks identical from
//! the caller's vantage point whether the calling layer or the target's own
//! downstream call was refused.

use crate::domain::FaultDomain;

pub const VERIFY_PROCESS_RUNNING: &str = "verify the target process is running";
pub const VERIFY_REACHABILITY: &str = "verify host/port reachability from the calling machine";
pub const CHECK_STARTUP_ERRORS: &str = "check the target's logs for crash or startup errors";

pub const VERIFY_CALLER_CREDENTIAL: &str =
    "verify the credential used by the calling layer matches what the target expects";
pub const VERIFY_DOWNSTREAM_CREDENTIAL: &str =
    "verify the credential the target uses to reach its own downstream dependency";
pub const CONFIRM_RESTART: &str =
    "confirm the target process was restarted after credential changes";

pub const LIVENESS_CREDENTIAL_GATED: &str =
    "the liveness probe was rejected as unauthorized; the health endpoint may be credential-gated, re-run with the credential attached to the health probe";
pub const LIVENESS_TIMED_OUT: &str =
    "the liveness probe timed out; check for an overloaded target or a firewall silently dropping traffic";
pub const RUN_CANCELLED: &str = "run was cancelled before completion; re-run the diagnosis";

/// Base hints for a fault domain.
pub fn hints_for(domain: FaultDomain) -> &'static [&'static str] {
    match domain {
        FaultDomain::Infrastructure => &[
            VERIFY_PROCESS_RUNNING,
            VERIFY_REACHABILITY,
            CHECK_STARTUP_ERRORS,
        ],
        FaultDomain::Credential => &[
            VERIFY_CALLER_CREDENTIAL,
            VERIFY_DOWNSTREAM_CREDENTIAL,
            CONFIRM_RESTART,
        ],
        FaultDomain::Healthy | FaultDomain::Unknown => &[],
    }
}

/// Owned copy of [`hints_for`], ready to place in a diagnosis.
pub fn remediation_for(domain: FaultDomain) -> Vec<String> {
    hints_for(domain).iter().map(|s| s.to_string()).collect()
}

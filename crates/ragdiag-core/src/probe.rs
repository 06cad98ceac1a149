//! The probe contract implemented by target system adapters.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ProbeOutcome;

/// A named, bounded diagnostic check against a target of type `T`.
///
/// Probes must be stateless and idempotent: invoking the same probe twice
/// against an unchanged target yields the same classification. Probes must
/// not retry internally; wrap them in [`crate::RetryProbe`] instead.
#[async_trait]
pub trait Probe<T: ?Sized + Sync>: Send + Sync {
    /// Stable identifier reported as `failed_probe` in a diagnosis.
    fn name(&self) -> &str;

    /// Per-probe time bound. `None` uses the engine default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Perform one check. Returning `Err` is treated as a failure without a
    /// status code.
    async fn invoke(&self, target: &T) -> ProbeOutcome;
}

/// Shared, type-erased probe handle.
pub type DynProbe<T> = Arc<dyn Probe<T>>;

#[async_trait]
impl<T, P> Probe<T> for Arc<P>
where
    T: ?Sized + Sync,
    P: Probe<T> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn timeout(&self) -> Option<Duration> {
        (**self).timeout()
    }

    async fn invoke(&self, target: &T) -> ProbeOutcome {
        (**self).invoke(target).await
    }
}

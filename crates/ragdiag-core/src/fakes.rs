//! Scripted in-memory probes (testing only)
//!
//! `ScriptedProbe` satisfies the [`Probe`] contract for any target type and
//! counts its invocations, so tests can assert that short-circuited probes
//! were never run.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ProbeResult, StatusCode};
use crate::error::{ProbeError, ProbeOutcome};
use crate::probe::Probe;

/// Shared invocation counter handed out by [`ScriptedProbe::calls`].
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Script {
    /// Return these results in order; the last one repeats.
    Results(Vec<ProbeResult>),
    Raise(String),
    Panic(String),
    Hang,
}

/// Probe returning a fixed script of outcomes.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    name: String,
    script: Script,
    timeout: Option<Duration>,
    calls: CallCounter,
}

impl ScriptedProbe {
    fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            timeout: None,
            calls: CallCounter::default(),
        }
    }

    pub fn succeeding(name: &str) -> Self {
        Self::new(name, Script::Results(vec![ProbeResult::success("ok")]))
    }

    pub fn failing(name: &str, status: StatusCode) -> Self {
        let detail = format!("scripted failure: {}", status);
        Self::new(name, Script::Results(vec![ProbeResult::failure(status, detail)]))
    }

    pub fn returning(name: &str, result: ProbeResult) -> Self {
        Self::new(name, Script::Results(vec![result]))
    }

    pub fn sequence(name: &str, results: Vec<ProbeResult>) -> Self {
        assert!(!results.is_empty(), "sequence needs at least one result");
        Self::new(name, Script::Results(results))
    }

    pub fn raising(name: &str, message: &str) -> Self {
        Self::new(name, Script::Raise(message.to_string()))
    }

    pub fn panicking(name: &str, message: &str) -> Self {
        Self::new(name, Script::Panic(message.to_string()))
    }

    /// Never completes; only useful together with a timeout or cancellation.
    pub fn hanging(name: &str) -> Self {
        Self::new(name, Script::Hang)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl<T: ?Sized + Sync> Probe<T> for ScriptedProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn invoke(&self, _target: &T) -> ProbeOutcome {
        let n = self.calls.bump() as usize;

        match &self.script {
            Script::Results(results) => {
                let idx = n.min(results.len() - 1);
                Ok(results[idx].clone())
            }
            Script::Raise(message) => Err(ProbeError::Transport(message.clone())),
            Script::Panic(message) => panic!("{}", message),
            Script::Hang => std::future::pending().await,
        }
    }
}

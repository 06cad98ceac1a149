//! Diagnosis run state machine.
//!
//! `NotStarted -> Running(index) -> Terminated(diagnosis)`. The probe index
//! only moves forward, and a terminated run never changes again.

use crate::domain::Diagnosis;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running { probe_index: usize },
    Terminated(Box<Diagnosis>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid run state transition: {current} -> {requested}")]
pub struct InvalidTransition {
    pub current: String,
    pub requested: String,
}

impl RunState {
    pub fn label(&self) -> String {
        match self {
            RunState::NotStarted => "not_started".to_string(),
            RunState::Running { probe_index } => format!("running({})", probe_index),
            RunState::Terminated(_) => "terminated".to_string(),
        }
    }

    /// Start the run at probe 0.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        match self {
            RunState::NotStarted => {
                *self = RunState::Running { probe_index: 0 };
                Ok(())
            }
            other => Err(InvalidTransition {
                current: other.label(),
                requested: "running(0)".to_string(),
            }),
        }
    }

    /// Move to the next probe after a success.
    pub fn advance(&mut self) -> Result<usize, InvalidTransition> {
        match self {
            RunState::Running { probe_index } => {
                *probe_index += 1;
                Ok(*probe_index)
            }
            other => Err(InvalidTransition {
                current: other.label(),
                requested: "advance".to_string(),
            }),
        }
    }

    /// Finish the run with a diagnosis.
    pub fn terminate(&mut self, diagnosis: Diagnosis) -> Result<(), InvalidTransition> {
        match self {
            RunState::Running { .. } => {
                *self = RunState::Terminated(Box::new(diagnosis));
                Ok(())
            }
            other => Err(InvalidTransition {
                current: other.label(),
                requested: "terminated".to_string(),
            }),
        }
    }

    pub fn probe_index(&self) -> Option<usize> {
        match self {
            RunState::Running { probe_index } => Some(*probe_index),
            _ => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, RunState::Terminated(_))
    }

    /// Take the diagnosis out of a terminated run.
    pub fn into_diagnosis(self) -> Option<Diagnosis> {
        match self {
            RunState::Terminated(diagnosis) => Some(*diagnosis),
            _ => None,
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a fetch task.
///
/// Transitions are monotonic along the transfer state machine except for the
/// retry self-loop (`Fetching -> Fetching`) and the cancel edge, which is
/// open from every non-terminal state.
///
/// ```text
/// Pending   -> Resolving
/// Resolving -> Fetching | Failed
/// Fetching  -> Fetched | Fetching | Failed
/// {Pending, Resolving, Fetching} -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Resolving,
    Fetching,
    Fetched,
    Failed,
    Cancelled,
}

/// A state string received on the control API did not name a known state.
#[derive(Debug, Error)]
#[error("unrecognized task state '{0}'")]
pub struct ParseStateError(pub String);

impl TaskState {
    /// Canonical wire string for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Resolving => "resolving",
            TaskState::Fetching => "fetching",
            TaskState::Fetched => "fetched",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }

    /// Whether `next` is a legal edge out of this state.
    pub fn can_transition(self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Pending, Resolving) => true,
            (Resolving, Fetching) | (Resolving, Failed) => true,
            (Fetching, Fetched) | (Fetching, Fetching) | (Fetching, Failed) => true,
            (Pending, Cancelled) | (Resolving, Cancelled) | (Fetching, Cancelled) => true,
            _ => false,
        }
    }

    /// Terminal states have no outgoing edges.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Fetched | TaskState::Failed | TaskState::Cancelled
        )
    }
}

impl FromStr for TaskState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskState::Pending),
            "resolving" => Ok(TaskState::Resolving),
            "fetching" => Ok(TaskState::Fetching),
            "fetched" => Ok(TaskState::Fetched),
            "failed" => Ok(TaskState::Failed),
            "cancelled" => Ok(TaskState::Cancelled),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

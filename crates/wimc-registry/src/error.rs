use thiserror::Error;
use wimc_task::{TaskId, TaskState};

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested edge does not exist in the transfer state machine.
    ///
    /// Surfacing this to a caller indicates a programming defect or a lost
    /// race (e.g. a worker writing after a cancel); callers abort the
    /// operation rather than retry it.
    #[error("invalid transition {from} -> {to} for task {id}")]
    InvalidTransition {
        id: TaskId,
        from: TaskState,
        to: TaskState,
    },

    #[error("task {0} not found")]
    NotFound(TaskId),
}

//! Task data model for the wimc fetch orchestrator.
//!
//! A [`Task`] tracks one capp fetch request from submission to a terminal
//! outcome. [`TaskState`] is the closed enumeration behind the state strings
//! exchanged on the control API, and [`TaskState::can_transition`] is the
//! single authority on which state edges exist; the registry rejects
//! everything else.

mod artifact;
mod state;
mod task;

pub use artifact::ArtifactDescriptor;
pub use state::{ParseStateError, TaskState};
pub use task::{FetchResult, Task, TaskId};

//! Synchronized task registry.
//!
//! The registry is the single shared mutable structure in the daemon. It
//! owns every [`Task`] record; workers and the control API read snapshots
//! and write back through the mutation interface here, which validates each
//! state change against [`TaskState::can_transition`] under one lock.
//!
//! The lock is held only for the read/compare/write itself; none of the
//! methods here await.

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{CancelOutcome, Created, TaskRegistry};

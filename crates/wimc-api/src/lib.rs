//! Control-API boundary: the typed surface an outer transport (HTTP, CLI)
//! mounts to drive the task registry and processor.
//!
//! Everything here is synchronous and transport-agnostic. Requests arrive as
//! serde DTOs or raw string identifiers, malformed input is rejected with
//! [`ApiError::MalformedRequest`] before it reaches the registry, and every
//! response carries a [`ResponseKind`] envelope.

mod api;
mod dto;
mod error;

pub use api::{ControlApi, Dispatcher};
pub use dto::{
    Envelope, ResponseKind, SubmitOutcome, SubmitRequest, TaskListDto, TaskSnapshotDto,
};
pub use error::ApiError;

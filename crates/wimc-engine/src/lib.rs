//! Task orchestration: the transfer state machine and the processor that
//! drives it.
//!
//! The [`Processor`] sweeps PENDING tasks out of the registry and claims
//! each one through the `Pending -> Resolving` edge; the registry rejects
//! the second claimer, so no task is ever driven by two workers. Claimed
//! tasks run on a bounded worker pool with exponential backoff between
//! retry cycles.
//!
//! Exhausting the ranked candidate list counts as one retry cycle; failing
//! over to the next candidate within the list does not.

mod backoff;
mod driver;
mod processor;
mod store;

pub use backoff::backoff_delay;
pub use driver::{RetryPolicy, TaskDriver};
pub use processor::{Processor, ProcessorHandle};
pub use store::StoreLayout;

//! Hub client: artifact metadata lookup and streamed payload retrieval.
//!
//! A fetch is single-pass: payload bytes are hashed while they stream into
//! a staging file, and the file is only promoted to its final path after the
//! byte count and digest both match the hub's declaration. A failed or
//! abandoned transfer leaves nothing behind a consumer could mistake for a
//! valid artifact.

mod client;
mod error;
mod staging;
mod transport;

pub use client::{HubClient, verify_local};
pub use error::HubError;
pub use staging::StagingFile;
pub use transport::{BoxStream, HubTransport};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;

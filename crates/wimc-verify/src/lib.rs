//! Content-digest primitives for fetched capp artifacts.
//!
//! Payload bytes are hashed incrementally while they stream to disk, so a
//! fetch never needs a second pass over the file to verify it. The expected
//! digest travels through the system as a [`Digest256`], parsed once at the
//! hub boundary and compared in constant form everywhere else.

mod digest;
mod hasher;

pub use digest::{Digest256, ParseDigestError};
pub use hasher::{Hasher, Sha256Hasher};

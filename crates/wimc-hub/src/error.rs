use std::io;

use thiserror::Error;
use wimc_verify::Digest256;

#[derive(Debug, Error)]
pub enum HubError {
    /// Transport-level failure before a usable hub response arrived.
    #[error("hub unreachable: {0}")]
    Unreachable(String),

    /// The hub answered, but does not know this name/tag.
    #[error("artifact {name}:{tag} not found on hub")]
    ArtifactNotFound { name: String, tag: String },

    /// The hub's response could not be decoded.
    #[error("malformed hub response: {0}")]
    MalformedResponse(String),

    /// The connection dropped before the declared size was reached.
    #[error("transfer interrupted: received {received} of {expected} bytes")]
    TransferInterrupted { expected: u64, received: u64 },

    /// Streamed content does not hash to the declared digest.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        expected: Digest256,
        actual: Digest256,
    },

    /// The per-call deadline elapsed.
    #[error("hub call exceeded deadline")]
    Timeout,

    #[error("local I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HubError {
    /// Transient failures are worth another candidate or retry cycle;
    /// everything else ends the current cycle's candidate walk.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HubError::Unreachable(_) | HubError::TransferInterrupted { .. } | HubError::Timeout
        )
    }
}

use sha2::digest::Digest;

/// Incremental content hasher.
///
/// Implementations are fed chunks as they arrive off the wire and finalized
/// once the stream ends.
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

/// SHA-256 hasher, the digest algorithm the hub publishes.
pub struct Sha256Hasher(sha2::Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self(sha2::Sha256::new())
    }

    /// One-shot digest of an in-memory buffer.
    pub fn digest(data: &[u8]) -> Vec<u8> {
        sha2::Sha256::digest(data).to_vec()
    }

    /// Finalize into a typed digest.
    pub fn finalize_digest(self) -> crate::Digest256 {
        let bytes: [u8; 32] = self.0.finalize().into();
        bytes.into()
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

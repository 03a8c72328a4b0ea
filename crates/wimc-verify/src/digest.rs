use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parsed SHA-256 digest.
///
/// Serializes to and from the 64-character lowercase hex form used on every
/// wire surface (hub metadata, control-API snapshots).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest256([u8; 32]);

#[derive(Debug, Error)]
#[error("invalid SHA-256 digest '{input}': {reason}")]
pub struct ParseDigestError {
    pub input: String,
    pub reason: String,
}

impl Digest256 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Build a digest from finalized hasher output.
    ///
    /// Fails if the hasher produced anything other than 32 bytes, which
    /// would mean a non-SHA-256 hasher was wired in.
    pub fn from_hasher_output(bytes: &[u8]) -> Result<Self, ParseDigestError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| ParseDigestError {
            input: hex::encode(bytes),
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        })?;
        Ok(Self(arr))
    }
}

impl From<[u8; 32]> for Digest256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Digest256 {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseDigestError {
                input: s.to_string(),
                reason: format!("expected 64 hex characters, got {}", s.len()),
            });
        }
        let bytes = hex::decode(s).map_err(|e| ParseDigestError {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        // length re-checked by the conversion
        Self::from_hasher_output(&bytes)
    }
}

impl TryFrom<String> for Digest256 {
    type Error = ParseDigestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Digest256> for String {
    fn from(d: Digest256) -> Self {
        d.to_string()
    }
}

impl fmt::Display for Digest256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest256({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn parse_and_display_round_trip() {
        let digest: Digest256 = SAMPLE.parse().unwrap();
        assert_eq!(digest.to_string(), SAMPLE);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = "abcd".parse::<Digest256>().unwrap_err();
        assert!(err.reason.contains("64 hex characters"));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(bad.parse::<Digest256>().is_err());
    }

    #[test]
    fn serde_uses_hex_string() {
        let digest: Digest256 = SAMPLE.parse().unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", SAMPLE));
        let back: Digest256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}

use serde::{Deserialize, Serialize};
use url::Url;
use wimc_verify::Digest256;

/// Hub-published description of one artifact.
///
/// Produced by a metadata lookup against a candidate hub and consumed by the
/// payload fetch, which checks the streamed bytes against `size_bytes` and
/// `digest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub tag: String,
    pub size_bytes: u64,
    pub digest: Digest256,
    /// Absolute payload location, already joined against the candidate hub
    /// URL when the hub returned a relative path.
    pub location: Url,
}

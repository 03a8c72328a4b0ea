use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use url::Url;
use wimc_task::ArtifactDescriptor;
use wimc_verify::{Digest256, Hasher, Sha256Hasher};

use crate::{HubError, HubTransport, StagingFile};

/// Wire shape of a hub metadata response.
#[derive(Debug, Deserialize)]
struct MetadataResponse {
    name: String,
    tag: String,
    size_bytes: u64,
    sha256: String,
    url: String,
}

/// Client for one hub's artifact endpoint, generic over the transport so
/// tests run against scripted responses.
pub struct HubClient<T: HubTransport> {
    transport: T,
    /// Deadline applied to each payload chunk read; a stalled stream counts
    /// as a transient failure for the attempt, independent of retry backoff.
    read_deadline: Duration,
}

impl<T: HubTransport> HubClient<T> {
    pub fn new(transport: T, read_deadline: Duration) -> Self {
        Self {
            transport,
            read_deadline,
        }
    }

    /// Look up artifact metadata at `candidate`.
    pub async fn fetch_metadata(
        &self,
        candidate: &Url,
        name: &str,
        tag: &str,
    ) -> Result<ArtifactDescriptor, HubError> {
        let url = metadata_url(candidate, name, tag)?;
        let (status, body) = self
            .transport
            .get_text(&url)
            .await
            .map_err(|e| HubError::Unreachable(e.to_string()))?;

        match status {
            200..=299 => {}
            404 => {
                return Err(HubError::ArtifactNotFound {
                    name: name.to_string(),
                    tag: tag.to_string(),
                });
            }
            other => {
                return Err(HubError::Unreachable(format!(
                    "hub returned status {other}"
                )));
            }
        }

        let meta: MetadataResponse = serde_json::from_str(&body)
            .map_err(|e| HubError::MalformedResponse(e.to_string()))?;
        if meta.name != name || meta.tag != tag {
            return Err(HubError::MalformedResponse(format!(
                "descriptor names {}:{}, requested {name}:{tag}",
                meta.name, meta.tag
            )));
        }
        let digest: Digest256 = meta
            .sha256
            .parse()
            .map_err(|e: wimc_verify::ParseDigestError| HubError::MalformedResponse(e.to_string()))?;
        // relative locations are joined against the candidate hub URL
        let location = candidate
            .join(&meta.url)
            .map_err(|e| HubError::MalformedResponse(format!("bad payload location: {e}")))?;

        tracing::debug!(%candidate, name, tag, size = meta.size_bytes, "metadata resolved");
        Ok(ArtifactDescriptor {
            name: meta.name,
            tag: meta.tag,
            size_bytes: meta.size_bytes,
            digest,
            location,
        })
    }

    /// Stream the payload into `staging_dir`, verifying size and digest
    /// incrementally, then atomically promote it to `destination`.
    ///
    /// On any failure the staging file is discarded; `destination` is
    /// touched only after full verification.
    pub async fn fetch_payload(
        &self,
        descriptor: &ArtifactDescriptor,
        staging_dir: &Path,
        destination: &Path,
    ) -> Result<(u64, Digest256), HubError> {
        let mut stream = self
            .transport
            .stream(&descriptor.location)
            .await
            .map_err(|e| HubError::Unreachable(e.to_string()))?;

        let file_name = format!("{}-{}", descriptor.name, descriptor.tag);
        let mut staging = StagingFile::create(staging_dir, &file_name).await?;
        let mut hasher = Sha256Hasher::new();
        let mut received: u64 = 0;

        loop {
            let chunk = match tokio::time::timeout(self.read_deadline, stream.next()).await {
                Err(_) => return Err(HubError::Timeout),
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::warn!(location = %descriptor.location, error = %e, "payload stream dropped");
                    return Err(HubError::TransferInterrupted {
                        expected: descriptor.size_bytes,
                        received,
                    });
                }
                Ok(Some(Ok(chunk))) => chunk,
            };
            hasher.update(&chunk);
            staging.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if received > descriptor.size_bytes {
                return Err(HubError::MalformedResponse(format!(
                    "payload exceeds declared size of {} bytes",
                    descriptor.size_bytes
                )));
            }
        }

        if received < descriptor.size_bytes {
            return Err(HubError::TransferInterrupted {
                expected: descriptor.size_bytes,
                received,
            });
        }

        let digest = hasher.finalize_digest();
        if digest != descriptor.digest {
            tracing::warn!(
                location = %descriptor.location,
                expected = %descriptor.digest,
                actual = %digest,
                "digest mismatch, discarding transfer"
            );
            return Err(HubError::DigestMismatch {
                expected: descriptor.digest,
                actual: digest,
            });
        }

        staging.commit(destination).await?;
        tracing::info!(path = %destination.display(), bytes = received, "artifact placed");
        Ok((received, digest))
    }
}

fn metadata_url(candidate: &Url, name: &str, tag: &str) -> Result<Url, HubError> {
    format!(
        "{}/capps/{name}/{tag}",
        candidate.as_str().trim_end_matches('/')
    )
    .parse()
    .map_err(|e| HubError::Unreachable(format!("bad candidate URL: {e}")))
}

/// Check whether a previously fetched artifact at `path` already matches
/// `descriptor`, so the engine can complete without re-downloading.
pub async fn verify_local(
    path: &Path,
    descriptor: &ArtifactDescriptor,
) -> Result<bool, HubError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let mut reader = tokio::io::BufReader::new(file);
    let mut hasher = Sha256Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok(total == descriptor.size_bytes && hasher.finalize_digest() == descriptor.digest)
}

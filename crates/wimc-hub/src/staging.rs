use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::HubError;

/// A partially written artifact under the staging directory.
///
/// The file exists only while this guard does: `commit` atomically renames
/// it to the destination, and dropping an uncommitted guard removes it, so
/// an interrupted, mismatched, or cancelled transfer never leaves a partial
/// file where a consumer could find it.
pub struct StagingFile {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    committed: bool,
}

impl StagingFile {
    /// Create `staging_dir/{file_name}.part`, creating the staging
    /// directory if needed.
    pub async fn create(staging_dir: &Path, file_name: &str) -> Result<Self, HubError> {
        tokio::fs::create_dir_all(staging_dir).await?;
        let path = staging_dir.join(format!("{file_name}.part"));
        let file = tokio::fs::File::create(&path).await?;
        Ok(Self {
            path,
            file: Some(file),
            committed: false,
        })
    }

    pub async fn write_all(&mut self, chunk: &[u8]) -> Result<(), HubError> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk).await?;
        }
        Ok(())
    }

    /// Flush and atomically promote the staging file to `destination`.
    pub async fn commit(mut self, destination: &Path) -> Result<(), HubError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&self.path, destination).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.committed {
            drop(self.file.take());
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

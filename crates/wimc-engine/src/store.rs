use std::path::{Path, PathBuf};

/// Layout of the local artifact store.
///
/// Staging lives next to the final tree on the same filesystem so the
/// promoting rename stays atomic.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for in-flight partial downloads.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    /// Final resting place of a fetched artifact.
    pub fn artifact_path(&self, name: &str, tag: &str) -> PathBuf {
        self.root.join("capps").join(name).join(tag)
    }
}

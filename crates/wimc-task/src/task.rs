use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wimc_verify::Digest256;

use crate::TaskState;

/// Unique request identifier, assigned at task creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a successful fetch: where the artifact landed and the digest
/// that was verified against the hub's declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub path: PathBuf,
    pub digest: Digest256,
}

/// One tracked fetch request.
///
/// Owned exclusively by the registry; everything outside the registry works
/// on snapshots and writes back through the registry's mutation interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub tag: String,
    pub state: TaskState,
    pub retry_count: u32,
    pub error_detail: Option<String>,
    pub result: Option<FetchResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A fresh PENDING task for `name:tag`.
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            name: name.into(),
            tag: tag.into(),
            state: TaskState::Pending,
            retry_count: 0,
            error_detail: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this task is still the in-flight request for `name:tag`.
    ///
    /// Duplicate submissions are keyed on this: a matching non-terminal task
    /// absorbs the resubmission, a terminal one does not.
    pub fn absorbs(&self, name: &str, tag: &str) -> bool {
        !self.state.is_terminal() && self.name == name && self.tag == tag
    }
}

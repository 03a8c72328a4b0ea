use serde::{Deserialize, Serialize};
use wimc_task::{Task, TaskState};

/// Envelope discriminator carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Request taken on; work has not finished.
    Accepted,
    /// The task exists and is still moving through the state machine.
    Processing,
    /// Terminal outcome with a usable result.
    Result,
    /// Terminal outcome without one.
    Error,
}

impl ResponseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Accepted => "accepted",
            ResponseKind::Processing => "processing",
            ResponseKind::Result => "result",
            ResponseKind::Error => "error",
        }
    }

    /// The kind a snapshot of a task in `state` is wrapped in.
    pub fn for_state(state: TaskState) -> Self {
        match state {
            TaskState::Fetched => ResponseKind::Result,
            TaskState::Failed | TaskState::Cancelled => ResponseKind::Error,
            _ => ResponseKind::Processing,
        }
    }
}

/// Response envelope: the kind discriminator plus the body's own fields,
/// flattened into one object on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    #[serde(flatten)]
    pub body: T,
}

/// A fetch submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub task_id: String,
    /// `false` when an in-flight duplicate absorbed the submission.
    pub created: bool,
}

impl SubmitOutcome {
    /// HTTP status an outer transport should answer with.
    pub fn status(&self) -> u16 {
        if self.created { 201 } else { 200 }
    }
}

/// Wire form of one task, readable by clients that know nothing about the
/// internal `Task` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshotDto {
    pub task_id: String,
    pub state: String,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl From<&Task> for TaskSnapshotDto {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.to_string(),
            state: task.state.as_str().to_string(),
            retry_count: task.retry_count,
            error_detail: task.error_detail.clone(),
            result_path: task
                .result
                .as_ref()
                .map(|r| r.path.display().to_string()),
            digest: task.result.as_ref().map(|r| r.digest.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskListDto {
    pub tasks: Vec<TaskSnapshotDto>,
}

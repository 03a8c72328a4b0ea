use std::sync::Arc;

use wimc_engine::ProcessorHandle;
use wimc_registry::{CancelOutcome, Created, TaskRegistry};
use wimc_task::{Task, TaskId, TaskState};

use crate::dto::{Envelope, ResponseKind, SubmitOutcome, SubmitRequest, TaskListDto, TaskSnapshotDto};
use crate::error::ApiError;

/// Engine-side effects the boundary triggers. Split out so the API logic is
/// testable without standing up a processor.
pub trait Dispatcher: Send + Sync {
    /// A fresh PENDING task is waiting for the sweep.
    fn task_submitted(&self);
    /// A task just moved to CANCELLED; stop its worker if one is running.
    fn task_cancelled(&self, id: TaskId);
}

impl Dispatcher for ProcessorHandle {
    fn task_submitted(&self) {
        self.notify_submitted();
    }

    fn task_cancelled(&self, id: TaskId) {
        self.abort_worker(id);
    }
}

/// The control boundary itself: validates input, talks to the registry, and
/// shapes responses. One instance is shared by every frontend.
pub struct ControlApi<D: Dispatcher> {
    registry: Arc<TaskRegistry>,
    dispatch: D,
}

impl<D: Dispatcher> ControlApi<D> {
    pub fn new(registry: Arc<TaskRegistry>, dispatch: D) -> Self {
        Self { registry, dispatch }
    }

    /// Submit a fetch request. Idempotent while a matching task is in
    /// flight; the envelope's `created` flag tells the two cases apart.
    pub fn submit(&self, request: &SubmitRequest) -> Result<Envelope<SubmitOutcome>, ApiError> {
        validate_component("name", &request.name)?;
        validate_component("tag", &request.tag)?;

        let (task, created) = self.registry.create(&request.name, &request.tag);
        let created = matches!(created, Created::New);
        if created {
            self.dispatch.task_submitted();
        }
        Ok(Envelope {
            kind: ResponseKind::Accepted,
            body: SubmitOutcome {
                task_id: task.id.to_string(),
                created,
            },
        })
    }

    /// Snapshot one task by its string identifier.
    pub fn query(&self, id: &str) -> Result<Envelope<TaskSnapshotDto>, ApiError> {
        let id = parse_task_id(id)?;
        let task = self
            .registry
            .get(id)
            .map_err(|_| ApiError::NotFound(id.to_string()))?;
        Ok(snapshot(&task))
    }

    /// Snapshot every task, optionally narrowed to one canonical state
    /// string. An unknown state string is a malformed request, not an empty
    /// list.
    pub fn list(&self, state: Option<&str>) -> Result<Envelope<TaskListDto>, ApiError> {
        let filter = state
            .map(|s| s.parse::<TaskState>())
            .transpose()
            .map_err(|e| ApiError::MalformedRequest(e.to_string()))?;

        let tasks = self
            .registry
            .list()
            .iter()
            .filter(|t| filter.is_none_or(|wanted| t.state == wanted))
            .map(TaskSnapshotDto::from)
            .collect();
        Ok(Envelope {
            kind: ResponseKind::Result,
            body: TaskListDto { tasks },
        })
    }

    /// Cancel a task. Terminal tasks are acknowledged unchanged.
    pub fn cancel(&self, id: &str) -> Result<Envelope<TaskSnapshotDto>, ApiError> {
        let id = parse_task_id(id)?;
        let outcome = self
            .registry
            .cancel(id)
            .map_err(|_| ApiError::NotFound(id.to_string()))?;
        let task = match outcome {
            CancelOutcome::Cancelled(task) => {
                self.dispatch.task_cancelled(id);
                task
            }
            CancelOutcome::AlreadyTerminal(task) => task,
        };
        Ok(snapshot(&task))
    }

    /// Forget a task. Acknowledged whether or not the task still exists.
    pub fn delete(&self, id: &str) -> Result<(), ApiError> {
        let id = parse_task_id(id)?;
        self.registry.delete(id);
        Ok(())
    }
}

fn snapshot(task: &Task) -> Envelope<TaskSnapshotDto> {
    Envelope {
        kind: ResponseKind::for_state(task.state),
        body: task.into(),
    }
}

fn parse_task_id(s: &str) -> Result<TaskId, ApiError> {
    TaskId::parse(s).map_err(|_| ApiError::MalformedRequest(format!("invalid task id {s:?}")))
}

/// Names and tags become path components under the store root, so anything
/// that could escape or alias a directory is refused at the boundary.
fn validate_component(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::MalformedRequest(format!(
            "{field} must not be empty"
        )));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(ApiError::MalformedRequest(format!(
            "{field} {value:?} is not a valid artifact {field}"
        )));
    }
    Ok(())
}

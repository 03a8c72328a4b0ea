use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use wimc_task::{FetchResult, Task, TaskId, TaskState};
use wimc_verify::Digest256;

use crate::RegistryError;

/// Whether `create` allocated a new task or matched an in-flight duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Created {
    New,
    Existing,
}

/// Result of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task was non-terminal and is now CANCELLED.
    Cancelled(Task),
    /// The task had already reached a terminal state; nothing changed.
    AlreadyTerminal(Task),
}

/// The ordered collection of tasks, keyed by request identifier.
///
/// All mutation is linearized through an internal mutex, so concurrent
/// `create`/`update_state`/`delete` calls on the same task observe a
/// consistent order. A state update is the atomic claim primitive for the
/// processor: of two workers racing `Pending -> Resolving`, exactly one
/// succeeds and the loser gets [`RegistryError::InvalidTransition`].
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a fetch request for `name:tag`.
    ///
    /// Idempotent while a matching task is in flight: the existing task is
    /// returned instead of a new one. Once the earlier task reaches a
    /// terminal state a resubmission allocates a fresh task with a distinct
    /// identifier.
    pub fn create(&self, name: &str, tag: &str) -> (Task, Created) {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        if let Some(existing) = tasks.values().find(|t| t.absorbs(name, tag)) {
            tracing::debug!(id = %existing.id, name, tag, "duplicate submission absorbed");
            return (existing.clone(), Created::Existing);
        }
        let task = Task::new(name, tag);
        tracing::info!(id = %task.id, name, tag, "task created");
        tasks.insert(task.id, task.clone());
        (task, Created::New)
    }

    /// Snapshot of one task.
    pub fn get(&self, id: TaskId) -> Result<Task, RegistryError> {
        let tasks = self.tasks.lock().expect("registry lock poisoned");
        tasks.get(&id).cloned().ok_or(RegistryError::NotFound(id))
    }

    /// Atomically move a task along a state-machine edge.
    ///
    /// `Some(detail)` replaces the task's last-error description; `None`
    /// keeps the existing one so retry progress stays observable across
    /// re-entries. Rejects edges not admitted by
    /// [`TaskState::can_transition`].
    pub fn update_state(
        &self,
        id: TaskId,
        next: TaskState,
        detail: Option<String>,
    ) -> Result<Task, RegistryError> {
        self.mutate(id, |task| {
            if !task.state.can_transition(next) {
                return Err(RegistryError::InvalidTransition {
                    id,
                    from: task.state,
                    to: next,
                });
            }
            tracing::debug!(%id, from = %task.state, to = %next, "state transition");
            task.state = next;
            if let Some(detail) = detail {
                task.error_detail = Some(detail);
            }
            Ok(())
        })
    }

    /// Record one consumed retry cycle: bump the counter and keep the error
    /// that ended the cycle observable. Valid only while the task is being
    /// actively retried (RESOLVING or FETCHING).
    pub fn record_retry(&self, id: TaskId, detail: String) -> Result<u32, RegistryError> {
        let task = self.mutate(id, |task| {
            if !matches!(task.state, TaskState::Resolving | TaskState::Fetching) {
                return Err(RegistryError::InvalidTransition {
                    id,
                    from: task.state,
                    to: task.state,
                });
            }
            task.retry_count += 1;
            task.error_detail = Some(detail);
            Ok(())
        })?;
        Ok(task.retry_count)
    }

    /// Terminal success: `Fetching -> Fetched` plus the verified result,
    /// written in one critical section so no reader can observe a FETCHED
    /// task without its result.
    pub fn complete(
        &self,
        id: TaskId,
        path: PathBuf,
        digest: Digest256,
    ) -> Result<Task, RegistryError> {
        self.mutate(id, |task| {
            if !task.state.can_transition(TaskState::Fetched) {
                return Err(RegistryError::InvalidTransition {
                    id,
                    from: task.state,
                    to: TaskState::Fetched,
                });
            }
            task.state = TaskState::Fetched;
            task.error_detail = None;
            task.result = Some(FetchResult { path, digest });
            Ok(())
        })
    }

    /// Cancel a task. Terminal tasks are left untouched (cancel is a no-op
    /// acknowledgement for them); anything else moves to CANCELLED.
    pub fn cancel(&self, id: TaskId) -> Result<CancelOutcome, RegistryError> {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        let task = tasks.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        if task.state.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal(task.clone()));
        }
        tracing::info!(%id, from = %task.state, "task cancelled");
        task.state = TaskState::Cancelled;
        task.updated_at = Utc::now();
        Ok(CancelOutcome::Cancelled(task.clone()))
    }

    /// Remove a task. Absent tasks are tolerated so concurrent double
    /// deletes are not an error.
    pub fn delete(&self, id: TaskId) {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        if tasks.remove(&id).is_some() {
            tracing::debug!(%id, "task deleted");
        }
    }

    /// Point-in-time snapshot of every task, ordered by creation time.
    pub fn list(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().expect("registry lock poisoned");
        let mut snapshot: Vec<Task> = tasks.values().cloned().collect();
        snapshot.sort_by_key(|t| (t.created_at, t.id.to_string()));
        snapshot
    }

    fn mutate(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut Task) -> Result<(), RegistryError>,
    ) -> Result<Task, RegistryError> {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        let task = tasks.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        f(task)?;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

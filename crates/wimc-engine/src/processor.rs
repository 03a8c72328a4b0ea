use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use wimc_hub::HubTransport;
use wimc_registry::{CancelOutcome, RegistryError, TaskRegistry};
use wimc_resolver::ProviderClient;
use wimc_task::{TaskId, TaskState};

use crate::TaskDriver;

type ActiveTasks = Arc<Mutex<HashMap<TaskId, CancellationToken>>>;

/// The dispatch loop: drains PENDING tasks and hands each to a worker.
///
/// At-most-once processing per task is enforced by the registry claim
/// (`Pending -> Resolving`); the semaphore only bounds how many claimed
/// tasks run concurrently. Completion order of distinct tasks is unrelated
/// to submission order.
pub struct Processor<P: ProviderClient + 'static, T: HubTransport + 'static> {
    driver: Arc<TaskDriver<P, T>>,
    registry: Arc<TaskRegistry>,
    workers: Arc<Semaphore>,
    active: ActiveTasks,
    wakeup: Arc<Notify>,
    sweep_interval: Duration,
}

/// Shared handle for the control-API boundary: wake the sweep after a
/// submission, or cancel an in-flight task.
#[derive(Clone)]
pub struct ProcessorHandle {
    registry: Arc<TaskRegistry>,
    active: ActiveTasks,
    wakeup: Arc<Notify>,
}

impl<P: ProviderClient, T: HubTransport> Processor<P, T> {
    pub fn new(
        driver: TaskDriver<P, T>,
        registry: Arc<TaskRegistry>,
        concurrency: usize,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            driver: Arc::new(driver),
            registry,
            workers: Arc::new(Semaphore::new(concurrency)),
            active: Arc::new(Mutex::new(HashMap::new())),
            wakeup: Arc::new(Notify::new()),
            sweep_interval,
        }
    }

    pub fn handle(&self) -> ProcessorHandle {
        ProcessorHandle {
            registry: self.registry.clone(),
            active: self.active.clone(),
            wakeup: self.wakeup.clone(),
        }
    }

    /// Run until `shutdown` fires. On shutdown every in-flight worker is
    /// told to stop; their staging guards discard partial transfers.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.wakeup.notified() => {}
                _ = ticker.tick() => {}
            }
            self.sweep(&shutdown).await;
        }

        let active = self.active.lock().expect("active map lock poisoned");
        for token in active.values() {
            token.cancel();
        }
        tracing::info!(in_flight = active.len(), "processor stopped");
    }

    /// Claim and dispatch every PENDING task visible in this pass.
    async fn sweep(&self, shutdown: &CancellationToken) {
        let pending: Vec<TaskId> = self
            .registry
            .list()
            .into_iter()
            .filter(|t| t.state == TaskState::Pending)
            .map(|t| t.id)
            .collect();

        for id in pending {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => return,
                permit = self.workers.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            // the claim: exactly one sweep wins this edge
            if self
                .registry
                .update_state(id, TaskState::Resolving, None)
                .is_err()
            {
                continue;
            }

            let token = CancellationToken::new();
            self.active
                .lock()
                .expect("active map lock poisoned")
                .insert(id, token.clone());

            let driver = self.driver.clone();
            let active = self.active.clone();
            tokio::spawn(async move {
                driver.drive(id, token).await;
                active.lock().expect("active map lock poisoned").remove(&id);
                drop(permit);
            });
        }
    }
}

impl ProcessorHandle {
    /// Nudge the sweep so a fresh submission is picked up without waiting
    /// for the next tick.
    pub fn notify_submitted(&self) {
        self.wakeup.notify_one();
    }

    /// Cancel a task: registry state first, then the in-flight worker's
    /// token so it aborts at its next checkpoint.
    pub fn cancel(&self, id: TaskId) -> Result<CancelOutcome, RegistryError> {
        let outcome = self.registry.cancel(id)?;
        if matches!(outcome, CancelOutcome::Cancelled(_)) {
            self.abort_worker(id);
        }
        Ok(outcome)
    }

    /// Fire the worker token for `id`, if one is in flight. Callers that
    /// already moved the task to CANCELLED themselves use this directly.
    pub fn abort_worker(&self, id: TaskId) {
        if let Some(token) = self
            .active
            .lock()
            .expect("active map lock poisoned")
            .get(&id)
        {
            token.cancel();
        }
    }
}

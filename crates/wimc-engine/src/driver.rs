use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wimc_hub::{HubClient, HubError, HubTransport, verify_local};
use wimc_registry::{RegistryError, TaskRegistry};
use wimc_resolver::{ProviderClient, ResolveError, Resolver};
use wimc_task::{TaskId, TaskState};
use wimc_verify::Digest256;

use crate::{StoreLayout, backoff_delay};

/// Retry and backoff parameters for the transfer state machine.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed cycles tolerated before the task is FAILED. A task's
    /// `retry_count` never exceeds this value; zero fails a task on its
    /// first unsuccessful cycle without counting a retry.
    pub max_retry_cycles: u32,
    pub backoff_base: Duration,
    pub backoff_ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_cycles: 3,
            backoff_base: Duration::from_millis(500),
            backoff_ceiling: Duration::from_secs(30),
        }
    }
}

/// Advances one claimed task from RESOLVING to a terminal state.
///
/// The driver holds no task state of its own; every observable change goes
/// through the registry, and the registry lock is never held across any of
/// the awaits here.
pub struct TaskDriver<P: ProviderClient, T: HubTransport> {
    registry: Arc<TaskRegistry>,
    resolver: Resolver<P>,
    hub: HubClient<T>,
    store: StoreLayout,
    policy: RetryPolicy,
}

/// What to do after a consumed retry cycle.
enum CycleVerdict {
    Retry,
    Stop,
}

impl<P: ProviderClient, T: HubTransport> TaskDriver<P, T> {
    pub fn new(
        registry: Arc<TaskRegistry>,
        resolver: Resolver<P>,
        hub: HubClient<T>,
        store: StoreLayout,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            resolver,
            hub,
            store,
            policy,
        }
    }

    /// Drive a task that the processor just claimed (state RESOLVING).
    ///
    /// Always leaves the task terminal or cancelled-by-someone-else; the
    /// only way out of the loop without a terminal write is observing that
    /// another path (cancel, delete) already ended the task.
    pub async fn drive(&self, id: TaskId, cancel: CancellationToken) {
        let task = match self.registry.get(id) {
            Ok(task) => task,
            // deleted between claim and spawn
            Err(_) => return,
        };
        if task.state.is_terminal() {
            return;
        }
        let name = task.name;
        let tag = task.tag;
        let destination = self.store.artifact_path(&name, &tag);

        loop {
            if cancel.is_cancelled() {
                return;
            }

            let candidates = match self.resolver.resolve(&name, &tag).await {
                Ok(candidates) => candidates,
                Err(e @ ResolveError::NoProvidersAvailable { .. }) => {
                    match self.consume_cycle(id, e.to_string(), &cancel).await {
                        CycleVerdict::Retry => continue,
                        CycleVerdict::Stop => return,
                    }
                }
            };

            // RESOLVING -> FETCHING on the first cycle, the retry self-loop
            // afterwards.
            if !self.write_state(id, TaskState::Fetching) {
                return;
            }

            let mut last_error: Option<HubError> = None;
            for candidate in &candidates {
                if cancel.is_cancelled() {
                    return;
                }

                let descriptor = match self.hub.fetch_metadata(&candidate.url, &name, &tag).await
                {
                    Ok(descriptor) => descriptor,
                    Err(e) if e.is_transient() => {
                        tracing::debug!(%id, candidate = %candidate.url, error = %e, "candidate failed, trying next");
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        last_error = Some(e);
                        break;
                    }
                };

                // a matching artifact from an earlier fetch completes the
                // task without touching the payload endpoint
                match verify_local(&destination, &descriptor).await {
                    Ok(true) => {
                        tracing::info!(%id, path = %destination.display(), "local artifact verified, skipping download");
                        self.finish(id, destination.clone(), descriptor.digest).await;
                        return;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        last_error = Some(e);
                        break;
                    }
                }

                match self
                    .hub
                    .fetch_payload(&descriptor, &self.store.staging_dir(), &destination)
                    .await
                {
                    Ok((_bytes, digest)) => {
                        self.finish(id, destination.clone(), digest).await;
                        return;
                    }
                    Err(e) if e.is_transient() => {
                        tracing::debug!(%id, candidate = %candidate.url, error = %e, "transfer failed, trying next candidate");
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        last_error = Some(e);
                        break;
                    }
                }
            }

            let detail = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "candidate list exhausted".to_string());
            match self.consume_cycle(id, detail, &cancel).await {
                CycleVerdict::Retry => continue,
                CycleVerdict::Stop => return,
            }
        }
    }

    /// Record a consumed retry cycle, fail the task if the budget is gone,
    /// otherwise back off (abandoning the sleep on cancel).
    async fn consume_cycle(
        &self,
        id: TaskId,
        detail: String,
        cancel: &CancellationToken,
    ) -> CycleVerdict {
        // a zero budget fails without touching the counter, keeping
        // retry_count within the ceiling
        if self.policy.max_retry_cycles == 0 {
            tracing::warn!(%id, detail, "no retry budget configured");
            if let Err(e) = self.registry.update_state(id, TaskState::Failed, Some(detail)) {
                self.log_lost_write(id, &e);
            }
            return CycleVerdict::Stop;
        }

        let count = match self.registry.record_retry(id, detail.clone()) {
            Ok(count) => count,
            // cancelled or deleted underneath us
            Err(_) => return CycleVerdict::Stop,
        };

        if count >= self.policy.max_retry_cycles {
            tracing::warn!(%id, retries = count, detail, "retry budget exhausted");
            if let Err(e) = self.registry.update_state(id, TaskState::Failed, Some(detail)) {
                self.log_lost_write(id, &e);
            }
            return CycleVerdict::Stop;
        }

        let delay = backoff_delay(
            count - 1,
            self.policy.backoff_base,
            self.policy.backoff_ceiling,
        );
        tracing::info!(%id, retry = count, delay_ms = delay.as_millis() as u64, detail, "backing off");
        tokio::select! {
            _ = cancel.cancelled() => CycleVerdict::Stop,
            _ = tokio::time::sleep(delay) => CycleVerdict::Retry,
        }
    }

    /// Write a non-terminal transition; `false` means this worker lost the
    /// task (cancelled or deleted) and must stop.
    fn write_state(&self, id: TaskId, next: TaskState) -> bool {
        match self.registry.update_state(id, next, None) {
            Ok(_) => true,
            Err(e) => {
                self.log_lost_write(id, &e);
                false
            }
        }
    }

    /// Terminal success. If a cancel won the race, the already-placed
    /// artifact is removed so a cancelled task leaves nothing behind.
    async fn finish(&self, id: TaskId, path: PathBuf, digest: Digest256) {
        if let Err(e) = self.registry.complete(id, path.clone(), digest) {
            self.log_lost_write(id, &e);
            let _ = tokio::fs::remove_file(&path).await;
        }
    }

    fn log_lost_write(&self, id: TaskId, error: &RegistryError) {
        match self.registry.get(id) {
            Ok(task) if task.state.is_terminal() => {
                tracing::debug!(%id, state = %task.state, "task ended elsewhere, worker stopping");
            }
            Ok(_) => {
                // an invalid transition against a live task is a state
                // machine defect, not a lost race
                tracing::error!(%id, error = %error, "unexpected registry rejection");
            }
            Err(_) => {
                tracing::debug!(%id, "task deleted, worker stopping");
            }
        }
    }
}

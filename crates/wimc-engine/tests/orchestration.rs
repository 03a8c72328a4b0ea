//! End-to-end orchestration scenarios against scripted provider and hub
//! transports: failover, retry cycles, digest failures, cancellation.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use url::Url;
use wimc_engine::{Processor, ProcessorHandle, RetryPolicy, StoreLayout, TaskDriver};
use wimc_hub::{BoxStream, HubClient, HubTransport};
use wimc_registry::{CancelOutcome, TaskRegistry};
use wimc_resolver::{ProviderClient, Resolver};
use wimc_task::{Task, TaskId, TaskState};
use wimc_verify::Sha256Hasher;

const PAYLOAD: &[u8] = b"edge node capp payload";

#[derive(Debug)]
struct NetDown;

impl fmt::Display for NetDown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection reset")
    }
}

impl std::error::Error for NetDown {}

/// Provider transport: endpoint -> canned discovery body. Missing endpoints
/// are unreachable.
struct MockProviders {
    bodies: HashMap<String, String>,
}

impl ProviderClient for MockProviders {
    type Error = NetDown;

    async fn discover(&self, endpoint: &Url, _: &str, _: &str) -> Result<String, Self::Error> {
        self.bodies.get(endpoint.as_str()).cloned().ok_or(NetDown)
    }
}

type Chunks = Vec<Result<Bytes, NetDown>>;

/// Hub transport with a per-URL queue of payload scripts; the last script
/// repeats once the queue is down to one entry.
#[derive(Default)]
struct ScriptedHub {
    meta: HashMap<String, (u16, String)>,
    payloads: Mutex<HashMap<String, VecDeque<Chunks>>>,
}

impl HubTransport for ScriptedHub {
    type Error = NetDown;

    async fn get_text(&self, url: &Url) -> Result<(u16, String), Self::Error> {
        self.meta.get(url.as_str()).cloned().ok_or(NetDown)
    }

    async fn stream(
        &self,
        url: &Url,
    ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
        let mut payloads = self.payloads.lock().unwrap();
        let queue = payloads.get_mut(url.as_str()).ok_or(NetDown)?;
        let script = if queue.len() > 1 {
            queue.pop_front().ok_or(NetDown)?
        } else {
            queue
                .front()
                .map(|chunks| {
                    chunks
                        .iter()
                        .map(|c| match c {
                            Ok(b) => Ok(b.clone()),
                            Err(_) => Err(NetDown),
                        })
                        .collect()
                })
                .ok_or(NetDown)?
        };
        Ok(Box::pin(futures_util::stream::iter(script)))
    }
}

struct Stack {
    registry: Arc<TaskRegistry>,
    handle: ProcessorHandle,
    shutdown: CancellationToken,
    store: StoreLayout,
    _tmp: tempfile::TempDir,
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn digest_hex() -> String {
    hex::encode(Sha256Hasher::digest(PAYLOAD))
}

fn provider_body(hubs: &[&str]) -> String {
    let entries: Vec<String> = hubs
        .iter()
        .map(|h| format!(r#"{{"url":"{h}"}}"#))
        .collect();
    format!(r#"{{"candidates":[{}]}}"#, entries.join(","))
}

fn metadata_for(hub: &str, name: &str, tag: &str) -> (String, (u16, String)) {
    let body = format!(
        r#"{{"name":"{name}","tag":"{tag}","size_bytes":{},"sha256":"{}","url":"/capps/{name}/{tag}/payload"}}"#,
        PAYLOAD.len(),
        digest_hex(),
    );
    (format!("{hub}capps/{name}/{tag}"), (200, body))
}

fn payload_url(hub: &str, name: &str, tag: &str) -> String {
    format!("{hub}capps/{name}/{tag}/payload")
}

fn full_payload() -> Chunks {
    vec![Ok(Bytes::from_static(PAYLOAD))]
}

fn short_payload() -> Chunks {
    vec![Ok(Bytes::from_static(&PAYLOAD[..5])), Err(NetDown)]
}

/// Wire up registry, resolver, hub client, and processor around the given
/// scripted transports and start the dispatch loop.
fn start(providers: MockProviders, hub: ScriptedHub, policy: RetryPolicy) -> Stack {
    let tmp = tempfile::tempdir().unwrap();
    let store = StoreLayout::new(tmp.path());
    let registry = Arc::new(TaskRegistry::new());

    let provider_urls: Vec<Url> = vec![
        "http://provider-a/".parse().unwrap(),
        "http://provider-b/".parse().unwrap(),
    ];
    let resolver = Resolver::new(provider_urls, providers);
    let hub_client = HubClient::new(hub, Duration::from_secs(2));
    let driver = TaskDriver::new(
        registry.clone(),
        resolver,
        hub_client,
        store.clone(),
        policy,
    );
    let processor = Arc::new(Processor::new(
        driver,
        registry.clone(),
        2,
        Duration::from_millis(10),
    ));
    let handle = processor.handle();
    let shutdown = CancellationToken::new();

    let run_shutdown = shutdown.clone();
    let run_processor = processor.clone();
    tokio::spawn(async move { run_processor.run(run_shutdown).await });

    Stack {
        registry,
        handle,
        shutdown,
        store,
        _tmp: tmp,
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retry_cycles: 3,
        backoff_base: Duration::from_millis(1),
        backoff_ceiling: Duration::from_millis(10),
    }
}

async fn wait_terminal(registry: &TaskRegistry, id: TaskId) -> Task {
    for _ in 0..1000 {
        let task = registry.get(id).unwrap();
        if task.state.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task never reached a terminal state");
}

fn submit(stack: &Stack, name: &str, tag: &str) -> TaskId {
    let (task, _) = stack.registry.create(name, tag);
    stack.handle.notify_submitted();
    task.id
}

#[tokio::test]
async fn fetch_succeeds_end_to_end() {
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-a/".to_string(),
            provider_body(&["http://hub-1/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    let (meta_url, meta) = metadata_for("http://hub-1/", "radio-ctl", "v1");
    hub.meta.insert(meta_url, meta);
    hub.payloads.lock().unwrap().insert(
        payload_url("http://hub-1/", "radio-ctl", "v1"),
        VecDeque::from([full_payload()]),
    );

    let stack = start(providers, hub, fast_policy());
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Fetched);
    assert_eq!(task.retry_count, 0);
    let result = task.result.expect("fetched task carries a result");
    assert_eq!(result.path, stack.store.artifact_path("radio-ctl", "v1"));
    assert_eq!(std::fs::read(&result.path).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn provider_failover_is_not_a_retry_cycle() {
    // provider-a unreachable, provider-b healthy
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-b/".to_string(),
            provider_body(&["http://hub-1/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    let (meta_url, meta) = metadata_for("http://hub-1/", "radio-ctl", "v1");
    hub.meta.insert(meta_url, meta);
    hub.payloads.lock().unwrap().insert(
        payload_url("http://hub-1/", "radio-ctl", "v1"),
        VecDeque::from([full_payload()]),
    );

    let stack = start(providers, hub, fast_policy());
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Fetched);
    assert_eq!(task.retry_count, 0);
}

#[tokio::test]
async fn candidate_failover_is_not_a_retry_cycle() {
    // hub-1 down entirely, hub-2 healthy; both from the same provider
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-a/".to_string(),
            provider_body(&["http://hub-1/", "http://hub-2/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    let (meta_url, meta) = metadata_for("http://hub-2/", "radio-ctl", "v1");
    hub.meta.insert(meta_url, meta);
    hub.payloads.lock().unwrap().insert(
        payload_url("http://hub-2/", "radio-ctl", "v1"),
        VecDeque::from([full_payload()]),
    );

    let stack = start(providers, hub, fast_policy());
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Fetched);
    assert_eq!(task.retry_count, 0);
}

#[tokio::test]
async fn all_providers_down_fails_after_budget() {
    let providers = MockProviders {
        bodies: HashMap::new(),
    };
    let stack = start(providers, ScriptedHub::default(), fast_policy());
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Failed);
    assert_eq!(task.retry_count, 3);
    assert!(
        task.error_detail
            .as_deref()
            .unwrap()
            .contains("no providers available")
    );
    assert!(task.result.is_none());
}

#[tokio::test]
async fn zero_retry_budget_fails_without_counting() {
    let providers = MockProviders {
        bodies: HashMap::new(),
    };
    let policy = RetryPolicy {
        max_retry_cycles: 0,
        backoff_base: Duration::from_millis(1),
        backoff_ceiling: Duration::from_millis(10),
    };
    let stack = start(providers, ScriptedHub::default(), policy);
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Failed);
    assert_eq!(task.retry_count, 0);
    assert!(
        task.error_detail
            .as_deref()
            .unwrap()
            .contains("no providers available")
    );
}

#[tokio::test]
async fn interrupted_twice_then_succeeds_within_budget() {
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-a/".to_string(),
            provider_body(&["http://hub-1/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    let (meta_url, meta) = metadata_for("http://hub-1/", "radio-ctl", "v1");
    hub.meta.insert(meta_url, meta);
    hub.payloads.lock().unwrap().insert(
        payload_url("http://hub-1/", "radio-ctl", "v1"),
        VecDeque::from([short_payload(), short_payload(), full_payload()]),
    );

    let stack = start(providers, hub, fast_policy());
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Fetched);
    assert_eq!(task.retry_count, 2);
    assert!(task.result.is_some());
}

#[tokio::test]
async fn digest_mismatch_fails_with_no_artifact() {
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-a/".to_string(),
            provider_body(&["http://hub-1/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    // descriptor declares a digest that the payload will not hash to
    let wrong = hex::encode(Sha256Hasher::digest(b"something else entirely"));
    let body = format!(
        r#"{{"name":"radio-ctl","tag":"v1","size_bytes":{},"sha256":"{wrong}","url":"/capps/radio-ctl/v1/payload"}}"#,
        PAYLOAD.len(),
    );
    hub.meta
        .insert("http://hub-1/capps/radio-ctl/v1".to_string(), (200, body));
    hub.payloads.lock().unwrap().insert(
        payload_url("http://hub-1/", "radio-ctl", "v1"),
        VecDeque::from([full_payload()]),
    );

    let stack = start(providers, hub, fast_policy());
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Failed);
    assert!(
        task.error_detail
            .as_deref()
            .unwrap()
            .contains("digest mismatch")
    );
    assert!(task.result.is_none());
    assert!(!stack.store.artifact_path("radio-ctl", "v1").exists());
    let staging_empty = match std::fs::read_dir(stack.store.staging_dir()) {
        Ok(entries) => entries.count() == 0,
        Err(_) => true,
    };
    assert!(staging_empty, "no partial artifact may survive");
}

#[tokio::test]
async fn artifact_unknown_to_hub_fails() {
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-a/".to_string(),
            provider_body(&["http://hub-1/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    hub.meta.insert(
        "http://hub-1/capps/radio-ctl/v1".to_string(),
        (404, "no such capp".to_string()),
    );

    let stack = start(providers, hub, fast_policy());
    let id = submit(&stack, "radio-ctl", "v1");

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Failed);
    assert!(task.error_detail.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn matching_local_artifact_short_circuits_download() {
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-a/".to_string(),
            provider_body(&["http://hub-1/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    let (meta_url, meta) = metadata_for("http://hub-1/", "radio-ctl", "v1");
    hub.meta.insert(meta_url, meta);
    // no payload scripted: any download attempt would be NetDown

    let stack = start(providers, hub, fast_policy());
    let dest = stack.store.artifact_path("radio-ctl", "v1");
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    std::fs::write(&dest, PAYLOAD).unwrap();

    let id = submit(&stack, "radio-ctl", "v1");
    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Fetched);
    assert_eq!(task.retry_count, 0);
    assert_eq!(task.result.unwrap().path, dest);
}

#[tokio::test]
async fn cancel_during_backoff_lands_in_cancelled() {
    let providers = MockProviders {
        bodies: HashMap::new(),
    };
    // long backoff keeps the task parked between cycles
    let policy = RetryPolicy {
        max_retry_cycles: 10,
        backoff_base: Duration::from_secs(5),
        backoff_ceiling: Duration::from_secs(5),
    };
    let stack = start(providers, ScriptedHub::default(), policy);
    let id = submit(&stack, "radio-ctl", "v1");

    // wait until the first cycle has been consumed
    for _ in 0..1000 {
        if stack.registry.get(id).unwrap().retry_count >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let outcome = stack.handle.cancel(id).unwrap();
    assert!(matches!(outcome, CancelOutcome::Cancelled(_)));

    let task = wait_terminal(&stack.registry, id).await;
    assert_eq!(task.state, TaskState::Cancelled);

    // cancelling a terminal task is a no-op acknowledgement
    let outcome = stack.handle.cancel(id).unwrap();
    assert!(matches!(outcome, CancelOutcome::AlreadyTerminal(_)));
}

#[tokio::test]
async fn cancel_before_dispatch_lands_in_cancelled() {
    let providers = MockProviders {
        bodies: HashMap::new(),
    };
    let stack = start(providers, ScriptedHub::default(), fast_policy());
    // create without waking the processor; the sweep may or may not have
    // seen it yet, both orders must end in CANCELLED
    let (task, _) = stack.registry.create("radio-ctl", "v1");
    stack.handle.cancel(task.id).unwrap();

    let task = wait_terminal(&stack.registry, task.id).await;
    assert_eq!(task.state, TaskState::Cancelled);
}

#[tokio::test]
async fn independent_tasks_complete_concurrently() {
    let providers = MockProviders {
        bodies: HashMap::from([(
            "http://provider-a/".to_string(),
            provider_body(&["http://hub-1/"]),
        )]),
    };
    let mut hub = ScriptedHub::default();
    for tag in ["v1", "v2", "v3", "v4"] {
        let (meta_url, meta) = metadata_for("http://hub-1/", "radio-ctl", tag);
        hub.meta.insert(meta_url, meta);
        hub.payloads.lock().unwrap().insert(
            payload_url("http://hub-1/", "radio-ctl", tag),
            VecDeque::from([full_payload()]),
        );
    }

    let stack = start(providers, hub, fast_policy());
    let ids: Vec<TaskId> = ["v1", "v2", "v3", "v4"]
        .iter()
        .map(|tag| submit(&stack, "radio-ctl", tag))
        .collect();

    for id in ids {
        let task = wait_terminal(&stack.registry, id).await;
        assert_eq!(task.state, TaskState::Fetched);
    }
}

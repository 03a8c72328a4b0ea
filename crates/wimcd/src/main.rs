//! wimcd: submit capp fetch requests and drive them to a terminal state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wimc_api::{ControlApi, SubmitRequest};
use wimc_engine::{Processor, ProcessorHandle, StoreLayout, TaskDriver};
use wimc_hub::{HubClient, ReqwestTransport};
use wimc_registry::TaskRegistry;
use wimc_resolver::{ReqwestProviderClient, Resolver};
use wimc_task::TaskState;

use crate::config::Config;
use crate::descriptor::Descriptor;

mod config;
mod descriptor;

const SWEEP_INTERVAL: Duration = Duration::from_millis(250);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "wimcd", version = env!("CARGO_PKG_VERSION"), about = "Edge-node artifact fetch orchestrator", long_about = None)]
struct App {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch artifacts and wait until every task is terminal.
    #[command(alias = "f", name = "fetch")]
    Fetch(FetchArgs),
}

#[derive(Debug, Args)]
struct FetchArgs {
    /// Artifacts to fetch, each written as name:tag.
    #[arg(required = true)]
    artifacts: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app = App::parse();
    let config_path = app
        .config
        .or_else(|| home::home_dir().map(|home| home.join(".wimc").join("wimcd.toml")))
        .context("no config given and no home directory to look in")?;
    let config = Config::load(&config_path)?;

    match app.cmd {
        Commands::Fetch(args) => fetch(config, args).await,
    }
}

async fn fetch(config: Config, args: FetchArgs) -> anyhow::Result<()> {
    let descriptors = args
        .artifacts
        .iter()
        .map(|s| Descriptor::try_from(s.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let registry = Arc::new(TaskRegistry::new());
    let resolver = Resolver::new(
        config.providers.clone(),
        ReqwestProviderClient::new(config.request_timeout())?,
    )
    .with_fallback(config.hub_url.clone());
    let hub = HubClient::new(
        ReqwestTransport::new(config.request_timeout())?,
        config.request_timeout(),
    );
    let driver = TaskDriver::new(
        registry.clone(),
        resolver,
        hub,
        StoreLayout::new(config.storage_root.clone()),
        config.retry_policy(),
    );
    let processor = Arc::new(Processor::new(
        driver,
        registry.clone(),
        config.concurrency,
        SWEEP_INTERVAL,
    ));
    let api = ControlApi::new(registry, processor.handle());

    let shutdown = CancellationToken::new();
    let run = {
        let processor = processor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { processor.run(shutdown).await })
    };

    let mut ids = Vec::with_capacity(descriptors.len());
    for descriptor in &descriptors {
        let envelope = api.submit(&SubmitRequest {
            name: descriptor.name.clone(),
            tag: descriptor.tag.clone(),
        })?;
        println!("{descriptor} -> task {}", envelope.body.task_id);
        ids.push(envelope.body.task_id);
    }

    let outcome = tokio::select! {
        outcome = wait_all(&api, &ids) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, cancelling outstanding tasks");
            for id in &ids {
                let _ = api.cancel(id);
            }
            wait_all(&api, &ids).await
        }
    };

    shutdown.cancel();
    let _ = run.await;
    outcome
}

/// Poll every task to a terminal state, printing each transition once.
async fn wait_all(api: &ControlApi<ProcessorHandle>, ids: &[String]) -> anyhow::Result<()> {
    let mut last_seen: HashMap<String, String> = HashMap::new();
    let mut open: Vec<String> = ids.to_vec();
    let mut failed = false;

    while !open.is_empty() {
        let mut still_open = Vec::new();
        for id in open {
            let snapshot = api.query(&id)?.body;
            if last_seen.get(&id) != Some(&snapshot.state) {
                println!("task {id}: {}", snapshot.state);
                last_seen.insert(id.clone(), snapshot.state.clone());
            }

            let state: TaskState = snapshot
                .state
                .parse()
                .context("registry produced an unknown state string")?;
            if !state.is_terminal() {
                still_open.push(id);
                continue;
            }

            match state {
                TaskState::Fetched => {
                    let path = snapshot.result_path.unwrap_or_default();
                    println!("task {id}: done, artifact at {path}");
                }
                TaskState::Failed => {
                    let detail = snapshot.error_detail.unwrap_or_default();
                    println!("task {id}: failed after {} retries: {detail}", snapshot.retry_count);
                    failed = true;
                }
                _ => {}
            }
        }
        open = still_open;
        if !open.is_empty() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    if failed {
        anyhow::bail!("one or more fetches failed");
    }
    Ok(())
}

//! Process entrypoint: loads configuration, builds the storage backend,
//! recovers from a prior crash, then runs the scheduler and HTTP API side by
//! side until a shutdown signal arrives.

mod config;
mod shutdown;
mod store_builder;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use orchestrator_http::AppState;
use orchestrator_scheduler::{recover_interrupted_tasks, Scheduler, SchedulerConfig, SleepRunner};
use tracing::info;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(config.tracing_filter());

    let store = store_builder::build(&config).await?;

    let recovered = recover_interrupted_tasks(store.as_ref()).await?;
    if !recovered.is_empty() {
        info!(count = recovered.len(), "recovered interrupted tasks from a previous run");
    }

    let scheduler = Scheduler::new(
        store.clone(),
        Arc::new(SleepRunner),
        SchedulerConfig {
            max_concurrent: config.max_concurrent_tasks,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        },
    );

    let scheduler_handle = tokio::spawn(Arc::clone(&scheduler).run());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState {
        store: store.clone(),
        scheduler: scheduler.clone(),
    };
    let http_handle = tokio::spawn(orchestrator_http::serve(addr, state));

    shutdown::wait_for_signal().await;
    info!("shutdown signal received, draining in-flight tasks");

    // Stop accepting new HTTP requests before touching the scheduler: the
    // accept loop itself is aborted here, but connections it already
    // spawned keep running on their own tasks and finish independently.
    http_handle.abort();

    scheduler.stop();
    let drained = shutdown::drain(&scheduler, Duration::from_secs(10)).await;

    scheduler_handle.abort();
    store.close().await?;

    if !drained {
        info!("shutdown complete after timeout, exiting with non-zero status");
        std::process::exit(1);
    }

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(log_level: impl AsRef<str>) {
    let log_level = log_level.as_ref();
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

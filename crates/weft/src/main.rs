//! Pipeline execution engine process entry point.
//!
//! Sequencing follows §10.5: load configuration, initialize tracing, build
//! the registry, construct the host client, start the execution store's
//! eviction task, start the scheduler's discovery and cron loops, then
//! serve the HTTP surface until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;

use weft_config::EngineConfig;
use weft_pipeline::{Clock, ExecutionTracker, HostClient, Registry, Scheduler, SystemClock};
use weft_pipeline::{ExecutionStore, PipelineExecutor};
use weft_server::{AppState, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Config load is fail-fast: a missing/invalid required field aborts
    // before any tracing or network setup happens.
    let config = EngineConfig::load()?;

    init_tracing(&config);

    tracing::info!(
        environment = %config.environment,
        http_port = config.http_port,
        "starting pipeline engine"
    );
    if config.is_production() {
        // Certificate provisioning is a reverse-proxy/ingress concern (§1);
        // this binary always serves plain HTTP and expects TLS termination
        // in front of it when `environment = production`.
        tracing::info!("production environment: expecting TLS termination upstream of this listener");
    }

    // The registry ships no built-in model/action services — those are
    // external adapter concerns (§4.4) — but starts usable-but-empty and
    // ready for embedders to populate before this binary is extended.
    let registry = Registry::new();

    let host_client = HostClient::new(&config.api_base_url, &config.api_host_header)?;

    let store = ExecutionStore::new(config.retention());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let eviction_handle = store.spawn_eviction_task(config.cleanup_interval(), clock);

    // Shared by the scheduler's single-flight executions and the HTTP
    // surface's on-demand executions, so shutdown can wait on both kinds
    // of in-flight pipeline run (§10.5).
    let tracker = ExecutionTracker::new();

    let executor = Arc::new(PipelineExecutor::new(registry.clone()));
    let scheduler = Arc::new(Scheduler::new(
        host_client.clone(),
        executor,
        store.clone(),
        tracker.clone(),
    ));
    let discovery_handle = scheduler.spawn_discovery_loop(config.poll_interval());
    let cron_handle = scheduler.spawn_cron_loop(config.cron_interval(), config.cron_url.clone());

    let app_state = AppState::new(registry, store, host_client, tracker.clone());
    let server = Server::new(app_state);
    let addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();

    let run_result = tokio::select! {
        result = server.run(addr) => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    // Stop admitting new work first: the discovery/cron loops won't start
    // another `try_execute`, and the evictor won't race a record an
    // in-flight execution is still writing to. Only then wait for every
    // execution task already in flight to finish (§10.5).
    discovery_handle.abort();
    cron_handle.abort();
    eviction_handle.stop();
    tracing::info!("waiting for in-flight pipeline executions to finish");
    tracker.join_all().await;

    run_result
}

/// Dual-layer tracing: a human-readable console layer honoring `--verbose`,
/// and a rotating daily JSON file under the configured log directory, kept
/// alive by leaking its `WorkerGuard` for the process lifetime.
fn init_tracing(config: &EngineConfig) {
    let filter = if config.verbose {
        "weft=debug,weft_pipeline=debug,weft_server=debug,weft_config=debug,info"
    } else {
        "weft=info,weft_pipeline=info,weft_server=info,weft_config=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "weft.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    std::mem::forget(guard);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "weft=trace,weft_pipeline=trace,weft_server=trace,weft_config=trace,info",
                )),
        )
        .init();
}

//! Application state shared across handlers.

use std::sync::Arc;

use weft_pipeline::{ExecutionStore, ExecutionTracker, HostClient, PipelineExecutor, Registry};

/// Shared state for the on-demand execution surface.
///
/// Cheap to clone: every field is already `Arc`-backed or itself a clone
/// handle (`Registry`, `ExecutionStore`, `HostClient`, `ExecutionTracker`).
/// The HTTP submit path never coalesces with the scheduler's running-set
/// (§5) — on-demand invocations always admit — so no running-set is
/// threaded through here. The tracker is shared with the scheduler so a
/// graceful shutdown waits on on-demand executions too (§10.5).
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub store: ExecutionStore,
    pub host_client: HostClient,
    pub executor: Arc<PipelineExecutor>,
    pub tracker: ExecutionTracker,
}

impl AppState {
    pub fn new(
        registry: Registry,
        store: ExecutionStore,
        host_client: HostClient,
        tracker: ExecutionTracker,
    ) -> Self {
        let executor = Arc::new(PipelineExecutor::new(registry.clone()));
        Self {
            registry,
            store,
            host_client,
            executor,
            tracker,
        }
    }
}

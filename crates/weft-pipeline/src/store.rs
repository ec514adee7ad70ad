//! In-memory execution record store with TTL eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::Clock;

/// Terminal or in-progress status of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Started,
    Completed,
    Failed,
}

/// One step's outcome within an execution's aggregate result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_uuid: String,
    pub step_description: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: f64,
    pub step_type: String,
    pub sequence: i64,
    pub data: Value,
    pub output_type: String,
    pub error_message: Option<String>,
}

/// A single execution's full lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub pipeline_id: String,
    pub status: ExecutionStatus,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub start_epoch: i64,
    pub end_epoch: Option<i64>,
    pub user_input: Option<String>,
    /// Keyed by each step's stable identifier.
    pub results: Option<HashMap<String, StepResult>>,
    pub error_message: Option<String>,
}

impl ExecutionRecord {
    /// A freshly-submitted record, before any step has run.
    pub fn started(execution_id: Uuid, pipeline_id: String, user_input: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            execution_id,
            pipeline_id,
            status: ExecutionStatus::Started,
            submitted_at: now,
            completed_at: None,
            start_epoch: now.timestamp(),
            end_epoch: None,
            user_input,
            results: None,
            error_message: None,
        }
    }
}

/// In-memory execution store, guarded by a reader-writer lock. Readers
/// (status/results handlers) never block the executor or evictor from
/// acquiring their own turn for long, since locks are held only for the
/// map access itself.
#[derive(Clone)]
pub struct ExecutionStore {
    records: Arc<RwLock<HashMap<Uuid, ExecutionRecord>>>,
    retention: Duration,
}

impl ExecutionStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    pub async fn insert(&self, record: ExecutionRecord) {
        self.records.write().await.insert(record.execution_id, record);
    }

    pub async fn get(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.records.read().await.get(&id).cloned()
    }

    pub async fn update<F>(&self, id: Uuid, f: F)
    where
        F: FnOnce(&mut ExecutionRecord),
    {
        if let Some(record) = self.records.write().await.get_mut(&id) {
            f(record);
        }
    }

    /// Remove every record whose `completed_at` is older than `retention`
    /// as of `now`. Returns the number evicted. Pure with respect to its
    /// inputs beyond the store's own state, so it is exercised directly in
    /// tests without needing a running ticker.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| match record.completed_at {
            Some(completed_at) => now - completed_at < self.retention,
            None => true,
        });
        before - records.len()
    }

    /// Start the background eviction task, waking every `interval`.
    pub fn spawn_eviction_task(
        &self,
        interval: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> EvictionHandle {
        let store = self.clone();
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_task = stopped.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if stopped_task.load(Ordering::SeqCst) {
                    break;
                }
                let evicted = store.sweep(clock.now()).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "execution store eviction sweep");
                }
            }
        });
        EvictionHandle { handle, stopped }
    }
}

/// Handle to a running eviction task. `stop` is idempotent.
pub struct EvictionHandle {
    handle: JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl EvictionHandle {
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.handle.abort();
        }
    }
}

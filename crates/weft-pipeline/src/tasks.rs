//! Tracked background-task spawning so the process can wait for in-flight
//! pipeline executions to finish before it exits (§10.5's graceful-shutdown
//! requirement).
//!
//! Both the scheduler (`scheduler.rs`'s `try_execute`) and the HTTP submit
//! handler (`weft-server`'s `execute` route) launch one execution per
//! accepted pipeline run on its own task. Neither keeps the resulting
//! `JoinHandle` around on its own, so a bare `tokio::spawn` would let the
//! runtime drop an in-flight execution mid-step on shutdown. `ExecutionTracker`
//! is the single place both call sites register that handle.

use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// A shared registry of in-flight execution tasks.
///
/// Cheap to clone (an `Arc` underneath via `JoinSet`'s own handle semantics
/// would not suffice here since spawning needs `&mut JoinSet`, so the set
/// itself sits behind an async mutex held only for the spawn/reap call).
#[derive(Clone, Default)]
pub struct ExecutionTracker {
    tasks: std::sync::Arc<Mutex<JoinSet<()>>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` as a tracked execution task. Opportunistically reaps
    /// already-finished tasks first so the set doesn't grow unbounded over
    /// a long-running process.
    pub async fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(fut);
    }

    /// Wait for every currently-tracked task to finish. Called once, after
    /// the discovery/cron loops and the eviction task have been signaled to
    /// stop, so no new executions are admitted while this drains (§10.5).
    pub async fn join_all(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

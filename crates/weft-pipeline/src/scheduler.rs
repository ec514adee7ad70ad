//! Scheduler: due-pipeline discovery, single-flight execution, the
//! failure-budget guard, and the independent cron-trigger loop (§4.1).

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::{Datelike, Local, NaiveTime};
use uuid::Uuid;

use crate::descriptor::{RecurringFrequency, ScheduleType, ScheduledPipeline};
use crate::executor::PipelineExecutor;
use crate::host_client::{ExecutionResultPayload, HostClient};
use crate::store::{ExecutionRecord, ExecutionStatus, ExecutionStore};
use crate::tasks::ExecutionTracker;

/// Pipelines currently executing, so the scheduler never runs the same
/// pipeline id twice concurrently (§4.1 "Single-flight invariant", §9).
#[derive(Clone, Default)]
pub struct RunningSet {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl RunningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to claim `id`. Returns `true` if this call claimed it,
    /// `false` if it was already reserved.
    pub fn try_reserve(&self, id: &str) -> bool {
        self.ids.lock().unwrap().insert(id.to_string())
    }

    /// Release a previously reserved id. A no-op if it wasn't reserved.
    pub fn release(&self, id: &str) {
        self.ids.lock().unwrap().remove(id);
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.ids.lock().unwrap().contains(id)
    }
}

/// Evaluate §4.1's due-pipeline predicate for a scheduled-pipeline
/// summary at the given instant.
///
/// `now` is local wall-clock time, matching the engine's "local time of
/// the process" rule for the recurring window (§4.1, §9: no DST/leap/
/// timezone handling beyond what the OS already does).
pub fn should_run(spec: &ScheduledPipeline, now: chrono::DateTime<Local>) -> bool {
    match spec.schedule_type {
        ScheduleType::OneTime => should_run_one_time(spec, now),
        ScheduleType::Recurring => should_run_recurring(spec, now),
    }
}

fn should_run_one_time(spec: &ScheduledPipeline, now: chrono::DateTime<Local>) -> bool {
    let Some(scheduled) = spec.scheduled_time else {
        return false;
    };
    let scheduled_local = scheduled.with_timezone(&Local);

    match spec.last_run_time {
        None => now >= scheduled_local,
        Some(last_run) => {
            let last_run_local = last_run.with_timezone(&Local);
            now > scheduled_local && last_run_local < scheduled_local
        }
    }
}

fn should_run_recurring(spec: &ScheduledPipeline, now: chrono::DateTime<Local>) -> bool {
    let Some(ref time_str) = spec.recurring_time else {
        return false;
    };
    let Ok(time_of_day) = NaiveTime::parse_from_str(time_str, "%H:%M") else {
        return false;
    };
    let Some(frequency) = spec.recurring_frequency else {
        return false;
    };

    let today = now.date_naive();
    let Some(scheduled_naive) = today.and_time(time_of_day).and_local_timezone(Local).single()
    else {
        return false;
    };

    let window_start = scheduled_naive - chrono::Duration::minutes(5);
    let window_end = scheduled_naive + chrono::Duration::minutes(5);
    let within = window_start < now && now < window_end;
    if !within {
        return false;
    }

    let start_of_today = match today.and_hms_opt(0, 0, 0).and_then(|naive| naive.and_local_timezone(Local).single())
    {
        Some(v) => v,
        None => return false,
    };

    let ran_before_today = match spec.last_run_time {
        None => true,
        Some(last_run) => last_run.with_timezone(&Local) < start_of_today,
    };
    if !ran_before_today {
        return false;
    }

    match frequency {
        RecurringFrequency::Daily => true,
        RecurringFrequency::Weekly => now.weekday() == chrono::Weekday::Mon,
        RecurringFrequency::Monthly => now.day() == 1,
    }
}

/// Drives the two independent loops described in §4.1/§5: discovery +
/// single-flight execution, and the cron-trigger GET.
pub struct Scheduler {
    host_client: HostClient,
    executor: Arc<PipelineExecutor>,
    store: ExecutionStore,
    running: RunningSet,
    tracker: ExecutionTracker,
}

impl Scheduler {
    pub fn new(
        host_client: HostClient,
        executor: Arc<PipelineExecutor>,
        store: ExecutionStore,
        tracker: ExecutionTracker,
    ) -> Self {
        Self {
            host_client,
            executor,
            store,
            running: RunningSet::new(),
            tracker,
        }
    }

    pub fn running_set(&self) -> RunningSet {
        self.running.clone()
    }

    /// Run one discovery tick: fetch scheduled summaries, evaluate
    /// `should_run` for each, and attempt an execution for each that is
    /// due. Never panics or propagates an error — transport failures are
    /// logged and the tick simply does nothing further (§4.1 "On fetch
    /// errors, log and continue").
    pub async fn discovery_tick(&self) {
        let scheduled = match self.host_client.fetch_scheduled().await {
            Ok(list) => list,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch scheduled pipelines");
                return;
            }
        };

        let now = Local::now();
        for summary in scheduled {
            if should_run(&summary, now) {
                self.try_execute(&summary.id).await;
            }
        }
    }

    /// Attempt to execute one pipeline, honoring single-flight and the
    /// failure-budget guard (§4.1).
    async fn try_execute(&self, pipeline_id: &str) {
        if !self.running.try_reserve(pipeline_id) {
            tracing::debug!(pipeline_id, "skipping: already in flight");
            return;
        }

        let pipeline = match self.host_client.fetch_pipeline(pipeline_id).await {
            Ok(pipeline) => pipeline,
            Err(err) => {
                tracing::error!(pipeline_id, error = %err, "failed to fetch pipeline");
                self.running.release(pipeline_id);
                return;
            }
        };

        if pipeline.execution_failures >= 3 {
            tracing::warn!(
                pipeline_id,
                execution_failures = pipeline.execution_failures,
                "skipping: past failure threshold"
            );
            self.running.release(pipeline_id);
            return;
        }

        let executor = self.executor.clone();
        let store = self.store.clone();
        let host_client = self.host_client.clone();
        let running = self.running.clone();
        let pipeline_id = pipeline_id.to_string();

        self.tracker.spawn(async move {
            let execution_id = Uuid::new_v4();
            store
                .insert(ExecutionRecord::started(execution_id, pipeline_id.clone(), None))
                .await;

            let outcome = executor.run(execution_id, &pipeline, None).await;
            let status = outcome.status();

            store
                .update(execution_id, |record| {
                    record.status = status;
                    record.completed_at = Some(outcome.end_time);
                    record.end_epoch = Some(outcome.end_time.timestamp());
                    record.error_message = outcome.error.as_ref().map(|e| e.to_string());
                    record.results = Some(outcome.step_results.clone());
                })
                .await;

            let payload = ExecutionResultPayload {
                pipeline_id: pipeline_id.clone(),
                start_time: outcome.start_time,
                end_time: outcome.end_time,
                step_results: outcome.step_results,
            };
            if let Err(err) = host_client.post_execution_result(&pipeline_id, &payload).await {
                tracing::error!(pipeline_id = %pipeline_id, error = %err, "failed to post execution result");
            }

            if let Some(ref err) = outcome.error {
                tracing::error!(pipeline_id = %pipeline_id, error = %err, "pipeline execution failed");
            } else {
                tracing::info!(pipeline_id = %pipeline_id, "pipeline execution completed");
            }

            running.release(&pipeline_id);
        })
        .await;
    }

    /// One cron-trigger tick: an auxiliary, functionally-unrelated GET to
    /// kick the host's own cron (§4.1, §9). `200`/`204` are success;
    /// anything else is logged, never retried within the tick.
    pub async fn cron_tick(&self, cron_url: &str) {
        if let Err(err) = self.host_client.trigger_cron(cron_url).await {
            tracing::error!(error = %err, "cron trigger request failed");
        }
    }

    /// Spawn the discovery loop as an independent task, ticking every
    /// `interval`.
    pub fn spawn_discovery_loop(self: &Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                scheduler.discovery_tick().await;
            }
        })
    }

    /// Spawn the cron-trigger loop as an independent task, ticking every
    /// `interval`.
    pub fn spawn_cron_loop(
        self: &Arc<Self>,
        interval: std::time::Duration,
        cron_url: String,
    ) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                scheduler.cron_tick(&cron_url).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn one_time(scheduled: DateTime<Utc>, last_run: Option<DateTime<Utc>>) -> ScheduledPipeline {
        ScheduledPipeline {
            id: "p1".into(),
            label: "one-time".into(),
            schedule_type: ScheduleType::OneTime,
            scheduled_time: Some(scheduled),
            recurring_frequency: None,
            recurring_time: None,
            last_run_time: last_run,
        }
    }

    fn recurring(
        frequency: RecurringFrequency,
        time: &str,
        last_run: Option<DateTime<Utc>>,
    ) -> ScheduledPipeline {
        ScheduledPipeline {
            id: "p2".into(),
            label: "recurring".into(),
            schedule_type: ScheduleType::Recurring,
            scheduled_time: None,
            recurring_frequency: Some(frequency),
            recurring_time: Some(time.to_string()),
            last_run_time: last_run,
        }
    }

    #[test]
    fn s1_due_one_time_never_run_fires() {
        let spec = one_time(utc(2023, 1, 1, 12, 0), None);
        let now = local(2023, 1, 1, 12, 2);
        assert!(should_run(&spec, now));
    }

    #[test]
    fn s2_already_ran_one_time_suppressed() {
        let spec = one_time(utc(2023, 1, 1, 12, 0), Some(utc(2023, 1, 1, 12, 1)));
        let now = local(2023, 1, 1, 12, 2);
        assert!(!should_run(&spec, now));
    }

    #[test]
    fn one_time_never_run_but_not_yet_due_does_not_fire() {
        let spec = one_time(utc(2023, 1, 1, 12, 0), None);
        let now = local(2023, 1, 1, 11, 59);
        assert!(!should_run(&spec, now));
    }

    #[test]
    fn s3_daily_recurring_outside_window() {
        let spec = recurring(RecurringFrequency::Daily, "14:30", None);
        let now = local(2023, 1, 1, 14, 36);
        assert!(!should_run(&spec, now));
    }

    #[test]
    fn s4_daily_recurring_inside_window_ran_yesterday() {
        let spec = recurring(RecurringFrequency::Daily, "14:30", Some(utc(2023, 1, 1, 14, 30)));
        let now = local(2023, 1, 2, 14, 32);
        assert!(should_run(&spec, now));
    }

    #[test]
    fn recurring_same_day_already_ran_suppressed() {
        let spec = recurring(RecurringFrequency::Daily, "14:30", Some(utc(2023, 1, 2, 14, 30)));
        let now = local(2023, 1, 2, 14, 32);
        assert!(!should_run(&spec, now));
    }

    #[test]
    fn recurring_weekly_requires_monday() {
        // 2023-01-02 is a Monday.
        let monday = recurring(RecurringFrequency::Weekly, "09:00", None);
        assert!(should_run(&monday, local(2023, 1, 2, 9, 2)));

        let tuesday_now = local(2023, 1, 3, 9, 2);
        assert!(!should_run(&monday, tuesday_now));
    }

    #[test]
    fn recurring_monthly_requires_first_of_month() {
        let spec = recurring(RecurringFrequency::Monthly, "09:00", None);
        assert!(should_run(&spec, local(2023, 2, 1, 9, 2)));
        assert!(!should_run(&spec, local(2023, 2, 2, 9, 2)));
    }

    #[test]
    fn recurring_invalid_time_never_fires() {
        let spec = recurring(RecurringFrequency::Daily, "not-a-time", None);
        assert!(!should_run(&spec, local(2023, 1, 1, 0, 0)));
    }

    #[test]
    fn recurring_window_boundary_is_open_not_closed() {
        // Exactly 5 minutes before the scheduled instant never fires
        // (open interval, §9's "Open questions").
        let spec = recurring(RecurringFrequency::Daily, "14:30", None);
        let now = local(2023, 1, 1, 14, 25);
        assert!(!should_run(&spec, now));
    }

    #[test]
    fn running_set_rejects_duplicate_reservation() {
        let set = RunningSet::new();
        assert!(set.try_reserve("p1"));
        assert!(!set.try_reserve("p1"));
        set.release("p1");
        assert!(set.try_reserve("p1"));
    }

    #[test]
    fn running_set_release_is_idempotent() {
        let set = RunningSet::new();
        set.release("never-reserved");
        assert!(!set.is_running("never-reserved"));
    }

    // --- `Scheduler::try_execute` end-to-end, against a mock host -------
    //
    // `HostClient` has no trait seam to mock directly, so these bind a real
    // `axum` listener standing in for the content-management host — the
    // same pattern `weft-server`'s own integration tests use for the
    // engine's own HTTP surface.

    use crate::descriptor::PipelineDescriptor;
    use crate::executor::PipelineExecutor;
    use crate::registry::Registry;
    use axum::{
        extract::{Path as AxumPath, State as AxumState},
        routing::{get, post},
        Json, Router,
    };
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Clone)]
    struct MockHostState {
        execution_failures: i64,
        fetch_calls: Arc<AtomicUsize>,
        post_calls: Arc<AtomicUsize>,
    }

    async fn mock_fetch_pipeline(
        AxumState(state): AxumState<MockHostState>,
        AxumPath(id): AxumPath<String>,
    ) -> Json<PipelineDescriptor> {
        state.fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
        Json(PipelineDescriptor {
            id,
            label: "mock pipeline".into(),
            steps: Vec::new(),
            execution_failures: state.execution_failures,
        })
    }

    async fn mock_post_result(
        AxumState(state): AxumState<MockHostState>,
        AxumPath(_id): AxumPath<String>,
    ) -> axum::http::StatusCode {
        state.post_calls.fetch_add(1, AtomicOrdering::SeqCst);
        axum::http::StatusCode::OK
    }

    /// Start a mock content-management host exposing just the two routes
    /// `try_execute` needs (`GET /pipelines/{id}`, `POST
    /// /pipeline/{id}/execution-result`), returning its address and call
    /// counters.
    async fn start_mock_host(execution_failures: i64) -> (SocketAddr, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let fetch_calls = Arc::new(AtomicUsize::new(0));
        let post_calls = Arc::new(AtomicUsize::new(0));
        let state = MockHostState {
            execution_failures,
            fetch_calls: fetch_calls.clone(),
            post_calls: post_calls.clone(),
        };

        let router = Router::new()
            .route("/pipelines/{id}", get(mock_fetch_pipeline))
            .route("/pipeline/{id}/execution-result", post(mock_post_result))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (addr, fetch_calls, post_calls)
    }

    fn test_scheduler(host_client: HostClient) -> Scheduler {
        let executor = Arc::new(PipelineExecutor::new(Registry::new()));
        let store = ExecutionStore::new(chrono::Duration::hours(1));
        Scheduler::new(host_client, executor, store, ExecutionTracker::new())
    }

    #[tokio::test]
    async fn try_execute_skips_pipeline_past_failure_threshold() {
        let (addr, fetch_calls, post_calls) = start_mock_host(3).await;
        let host_client = HostClient::new(format!("http://{addr}"), "localhost").unwrap();
        let scheduler = test_scheduler(host_client);

        scheduler.try_execute("p1").await;

        assert_eq!(fetch_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(
            post_calls.load(AtomicOrdering::SeqCst),
            0,
            "a pipeline past the failure threshold must never reach execution, so no result is posted"
        );
        assert!(!scheduler.running_set().is_running("p1"), "slot must be released on skip");
    }

    #[tokio::test]
    async fn try_execute_runs_and_releases_pipeline_under_threshold() {
        let (addr, fetch_calls, post_calls) = start_mock_host(0).await;
        let host_client = HostClient::new(format!("http://{addr}"), "localhost").unwrap();
        let scheduler = test_scheduler(host_client);

        scheduler.try_execute("p1").await;
        scheduler.tracker.join_all().await;

        assert_eq!(fetch_calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(post_calls.load(AtomicOrdering::SeqCst), 1);
        assert!(!scheduler.running_set().is_running("p1"));
    }

    #[tokio::test]
    async fn try_execute_enforces_single_flight_per_pipeline() {
        let (addr, fetch_calls, _post_calls) = start_mock_host(0).await;
        let host_client = HostClient::new(format!("http://{addr}"), "localhost").unwrap();
        let scheduler = test_scheduler(host_client);

        // Two concurrent attempts for the same id: the running set's
        // reservation is synchronous, so only the first should ever reach
        // the host fetch — the second must bail out immediately.
        let (_, _) = tokio::join!(scheduler.try_execute("p1"), scheduler.try_execute("p1"));
        scheduler.tracker.join_all().await;

        assert_eq!(
            fetch_calls.load(AtomicOrdering::SeqCst),
            1,
            "single-flight must reject the second concurrent attempt before any host I/O"
        );
    }
}

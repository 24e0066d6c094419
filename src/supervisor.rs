//! Refresh supervisor: single-flight background refresh with atomic publish.
//!
//! ## State machine
//!
//! ```text
//! Idle ──start──▶ Running(run) ──CacheDone + photos──▶ Published ─┐
//!                      │        ──CacheDone, no photos─▶ Failed ───┤
//!                      │        ──Fault───────────────▶ Failed ───┤
//!                      └──start (cancels run)──▶ Running(run+1)    │
//!                                                                  ▼
//! Idle ◀──────────────────────── timer fires ◀────────────── Scheduled
//! ```
//!
//! One control thread owns all run state and is the only writer of the
//! published catalog. It receives [`Control`] messages from the public API,
//! from runs, and from its own timer (a `recv_timeout` deadline).
//!
//! ## Runs
//!
//! Each run is a fresh OS thread executing a [`RefreshJob`], holding a
//! [`CancelToken`]. Starting a run first cancels the current one and clears
//! any scheduled timer, so at most one run is ever current. A cancelled run
//! keeps going until its next cancellation check, but everything it sends is
//! tagged with its run id and dropped by the control thread. A panicking run
//! is caught and reported as a fault; the supervisor logs it and schedules
//! the next run as usual.
//!
//! ## Publishing
//!
//! The catalog and display strings live together in one [`Published`]
//! value behind `RwLock<Arc<_>>`. Readers take the read lock only long
//! enough to clone the `Arc`, so they never wait on a refresh, and they
//! always see a snapshot and strings from the same run.

use crate::health::{ActivityLog, HealthReport, TriggerTokens};
use crate::types::{CatalogSnapshot, DisplayStrings};
use crate::worker::{
    CancelToken, Progress, RefreshJob, RunHandle, RunMessage, StartParams, WorkerEvent,
};
use chrono::{DateTime, Utc};
use log::Level;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to start supervisor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Delay between the end of one run and the start of the next.
    pub interval: Duration,
    pub thumb_sizes: [u32; 3],
    pub log_capacity: usize,
    /// Start a run as soon as the supervisor is spawned.
    pub start_immediately: bool,
    /// Strings served until a run publishes its own.
    pub initial_strings: DisplayStrings,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            thumb_sizes: crate::imaging::thumbnail_sizes(250),
            log_capacity: crate::health::DEFAULT_LOG_CAPACITY,
            start_immediately: true,
            initial_strings: DisplayStrings::default(),
        }
    }
}

/// A catalog snapshot and the display strings published with it.
#[derive(Debug, Clone, Default)]
pub struct Published {
    pub snapshot: Arc<CatalogSnapshot>,
    pub strings: Arc<DisplayStrings>,
    pub published_at: Option<DateTime<Utc>>,
    /// Run that produced this value. `None` before the first publish.
    pub run_id: Option<u64>,
}

#[derive(Debug)]
enum Control {
    RefreshNow,
    Worker(RunMessage),
    Shutdown,
}

/// Publishing run ids remembered for [`RefreshSupervisor::published_runs`].
const PUBLISHED_RUNS_KEPT: usize = 16;

/// Health-facing mirror of the control thread's state.
struct Status {
    active_since: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    /// Starts requested but not yet picked up by the control thread.
    pending_starts: usize,
    log: ActivityLog,
    published_runs: VecDeque<u64>,
}

impl Status {
    fn new(log_capacity: usize, pending_starts: usize) -> Self {
        Self {
            active_since: None,
            next_run_at: None,
            pending_starts,
            log: ActivityLog::new(log_capacity),
            published_runs: VecDeque::new(),
        }
    }

    fn is_idle(&self) -> bool {
        self.active_since.is_none() && self.pending_starts == 0
    }

    fn request_start(&mut self) {
        self.pending_starts += 1;
    }

    /// Consume one queued start and mark a run active.
    fn begin_run(&mut self, at: DateTime<Utc>) {
        self.pending_starts = self.pending_starts.saturating_sub(1);
        self.active_since = Some(at);
        self.next_run_at = None;
    }

    fn note_published(&mut self, run_id: u64) {
        if self.published_runs.len() == PUBLISHED_RUNS_KEPT {
            self.published_runs.pop_front();
        }
        self.published_runs.push_back(run_id);
    }
}

struct Shared {
    published: RwLock<Arc<Published>>,
    status: Mutex<Status>,
    idle: Condvar,
    tokens: TriggerTokens,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn published(&self) -> Arc<Published> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn publish(&self, value: Published) {
        *self.published.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(value);
    }

    /// Log through the `log` facade and into the activity log.
    fn record(&self, level: Level, message: String) {
        log::log!(level, "{message}");
        self.status().log.push(level, message);
    }
}

/// Handle to a running supervisor. Dropping it shuts the supervisor down.
pub struct RefreshSupervisor {
    shared: Arc<Shared>,
    control: Sender<Control>,
    thread: Option<JoinHandle<()>>,
}

impl RefreshSupervisor {
    pub fn spawn(
        job: Arc<dyn RefreshJob>,
        config: SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        let shared = Arc::new(Shared {
            published: RwLock::new(Arc::new(Published {
                strings: Arc::new(config.initial_strings.clone()),
                ..Published::default()
            })),
            status: Mutex::new(Status::new(
                config.log_capacity,
                usize::from(config.start_immediately),
            )),
            idle: Condvar::new(),
            tokens: TriggerTokens::new(),
        });

        let (tx, rx) = mpsc::channel();
        if config.start_immediately {
            let _ = tx.send(Control::RefreshNow);
        }

        let control_loop = ControlLoop {
            shared: shared.clone(),
            tx: tx.clone(),
            job,
            config,
            next_run_id: 0,
            current: None,
            deadline: None,
        };
        let thread = std::thread::Builder::new()
            .name("refresh-supervisor".to_string())
            .spawn(move || control_loop.run(rx))?;

        Ok(Self {
            shared,
            control: tx,
            thread: Some(thread),
        })
    }

    /// The current catalog snapshot.
    pub fn catalog(&self) -> Arc<CatalogSnapshot> {
        self.shared.published().snapshot.clone()
    }

    pub fn strings(&self) -> Arc<DisplayStrings> {
        self.shared.published().strings.clone()
    }

    /// Snapshot and strings as one consistent value.
    pub fn published(&self) -> Arc<Published> {
        self.shared.published()
    }

    /// Ids of the most recent runs that published, oldest first.
    pub fn published_runs(&self) -> Vec<u64> {
        self.shared.status().published_runs.iter().copied().collect()
    }

    pub fn health(&self) -> HealthReport {
        let published = self.shared.published();
        let status = self.shared.status();
        HealthReport {
            active_since: status.active_since,
            next_run_at: status.next_run_at,
            last_published_at: published.published_at,
            photo_count: published.snapshot.len(),
            logs: status.log.recent(),
        }
    }

    /// Start a refresh now, cancelling any running one.
    pub fn refresh_now(&self) {
        self.shared.status().request_start();
        if self.control.send(Control::RefreshNow).is_err() {
            let mut status = self.shared.status();
            status.pending_starts = status.pending_starts.saturating_sub(1);
            log::warn!("refresh requested after supervisor stopped");
        }
    }

    /// Mint the single-use token the manual trigger must present.
    pub fn issue_trigger_token(&self) -> String {
        self.shared.tokens.issue()
    }

    /// Manual trigger. Starts a refresh only for a valid, unused token.
    pub fn trigger_refresh(&self, token: &str) -> bool {
        if self.shared.tokens.redeem(token) {
            self.shared
                .record(Level::Info, "manual refresh triggered".to_string());
            self.refresh_now();
            true
        } else {
            self.shared
                .record(Level::Warn, "manual refresh rejected: invalid token".to_string());
            false
        }
    }

    /// Block until no run is active or requested. False on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let status = self.shared.status();
        let (status, _) = self
            .shared
            .idle
            .wait_timeout_while(status, timeout, |s| !s.is_idle())
            .unwrap_or_else(|e| e.into_inner());
        status.is_idle()
    }

    /// Cancel any running refresh and stop the control thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.control.send(Control::Shutdown);
            if thread.join().is_err() {
                log::error!("refresh supervisor thread panicked");
            }
        }
    }
}

impl Drop for RefreshSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CurrentRun {
    id: u64,
    cancel: CancelToken,
    progress: Progress,
}

struct ControlLoop {
    shared: Arc<Shared>,
    tx: Sender<Control>,
    job: Arc<dyn RefreshJob>,
    config: SupervisorConfig,
    next_run_id: u64,
    current: Option<CurrentRun>,
    deadline: Option<Instant>,
}

impl ControlLoop {
    fn run(mut self, rx: Receiver<Control>) {
        loop {
            let message = match self.deadline {
                Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        self.shared
                            .record(Level::Info, "scheduled refresh starting".to_string());
                        self.shared.status().request_start();
                        Control::RefreshNow
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            match message {
                Control::RefreshNow => self.start_run(),
                Control::Worker(message) => self.on_worker(message),
                Control::Shutdown => break,
            }
        }

        if let Some(run) = self.current.take() {
            run.cancel.cancel();
        }
        let mut status = self.shared.status();
        status.active_since = None;
        status.next_run_at = None;
        status.pending_starts = 0;
        drop(status);
        self.shared.idle.notify_all();
    }

    fn start_run(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.cancel.cancel();
            self.shared
                .record(Level::Info, format!("cancelled run {}", previous.id));
        }
        self.deadline = None;

        self.next_run_id += 1;
        let id = self.next_run_id;
        let cancel = CancelToken::new();
        let tx = self.tx.clone();
        let handle = RunHandle::new(id, cancel.clone(), move |message| {
            let _ = tx.send(Control::Worker(message));
        });
        let job = self.job.clone();
        let params = StartParams {
            thumb_sizes: self.config.thumb_sizes,
        };

        // Mark active before the run can report anything
        self.shared.status().begin_run(Utc::now());

        let spawned = std::thread::Builder::new()
            .name(format!("refresh-run-{id}"))
            .spawn(move || {
                let event = match catch_unwind(AssertUnwindSafe(|| job.run(&params, &handle))) {
                    Ok(()) => WorkerEvent::CacheDone,
                    Err(payload) => WorkerEvent::Fault(panic_message(payload.as_ref())),
                };
                handle.send(event);
            });

        match spawned {
            Ok(_) => {
                self.current = Some(CurrentRun {
                    id,
                    cancel,
                    progress: Progress::default(),
                });
                self.shared.record(Level::Info, format!("started run {id}"));
            }
            Err(e) => {
                self.shared
                    .record(Level::Error, format!("could not start run {id}: {e}"));
                self.schedule_next();
            }
        }
    }

    fn on_worker(&mut self, message: RunMessage) {
        let Some(run) = self.current.as_mut().filter(|r| r.id == message.run_id) else {
            log::debug!("ignoring message from stale run {}", message.run_id);
            return;
        };

        match message.event {
            WorkerEvent::Progress(update) => merge_progress(&mut run.progress, update),
            WorkerEvent::Log(level, text) => {
                self.shared
                    .status()
                    .log
                    .push(level, format!("run {}: {}", message.run_id, text));
            }
            WorkerEvent::CacheDone => self.finish(None),
            WorkerEvent::Fault(reason) => self.finish(Some(reason)),
        }
    }

    /// End the current run. `fault` is the panic message of a crashed run.
    fn finish(&mut self, fault: Option<String>) {
        let Some(run) = self.current.take() else {
            return;
        };

        match (fault, run.progress.photos) {
            (Some(reason), _) => {
                self.shared
                    .record(Level::Error, format!("run {} crashed: {}", run.id, reason));
            }
            (None, Some(snapshot)) => {
                let previous = self.shared.published();
                let strings = DisplayStrings {
                    title: run.progress.title.unwrap_or_else(|| previous.strings.title.clone()),
                    subtitle: run
                        .progress
                        .subtitle
                        .unwrap_or_else(|| previous.strings.subtitle.clone()),
                    supporting_text: run
                        .progress
                        .supporting_text
                        .unwrap_or_else(|| previous.strings.supporting_text.clone()),
                };
                let count = snapshot.len();
                self.shared.publish(Published {
                    snapshot: Arc::new(snapshot),
                    strings: Arc::new(strings),
                    published_at: Some(Utc::now()),
                    run_id: Some(run.id),
                });
                self.shared.status().note_published(run.id);
                self.shared.record(
                    Level::Info,
                    format!("run {} published {} photos", run.id, count),
                );
            }
            (None, None) => {
                self.shared.record(
                    Level::Warn,
                    format!("run {} finished without a catalog, keeping previous", run.id),
                );
            }
        }

        self.schedule_next();
    }

    fn schedule_next(&mut self) {
        let interval = self.config.interval;
        self.deadline = Some(Instant::now() + interval);
        {
            let mut status = self.shared.status();
            status.active_since = None;
            status.next_run_at = chrono::Duration::from_std(interval)
                .ok()
                .map(|d| Utc::now() + d);
        }
        self.shared.idle.notify_all();
    }
}

fn merge_progress(into: &mut Progress, update: Progress) {
    if update.title.is_some() {
        into.title = update.title;
    }
    if update.subtitle.is_some() {
        into.subtitle = update.subtitle;
    }
    if update.supporting_text.is_some() {
        into.supporting_text = update.supporting_text;
    }
    if update.photos.is_some() {
        into.photos = update.photos;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::PhotoNormalizer;
    use crate::test_helpers::raw_photo;
    use std::collections::HashMap;

    const WAIT: Duration = Duration::from_secs(10);

    /// What a scripted run does, keyed by run id.
    #[derive(Clone, Default)]
    struct Script {
        strings: Option<DisplayStrings>,
        photos: Option<Vec<&'static str>>,
        block_until_cancelled: bool,
        panic: bool,
    }

    struct ScriptedJob {
        scripts: HashMap<u64, Script>,
        started: Mutex<Sender<u64>>,
        saw_cancel: Mutex<Vec<u64>>,
    }

    impl ScriptedJob {
        fn new(scripts: Vec<(u64, Script)>) -> (Arc<Self>, Receiver<u64>) {
            let (tx, rx) = mpsc::channel();
            let job = Arc::new(Self {
                scripts: scripts.into_iter().collect(),
                started: Mutex::new(tx),
                saw_cancel: Mutex::new(Vec::new()),
            });
            (job, rx)
        }
    }

    impl RefreshJob for ScriptedJob {
        fn run(&self, _params: &StartParams, run: &RunHandle) {
            let script = self.scripts.get(&run.run_id()).cloned().unwrap_or_default();
            if let Some(strings) = script.strings {
                run.report(Progress::strings(strings));
            }
            if let Some(ids) = script.photos {
                let raw = ids.iter().map(|id| raw_photo(id, 10, 10)).collect();
                run.report(Progress::photos(PhotoNormalizer::default().normalize(raw)));
            }
            let _ = self.started.lock().unwrap().send(run.run_id());
            if script.panic {
                panic!("scripted failure");
            }
            if script.block_until_cancelled {
                let deadline = Instant::now() + WAIT;
                while !run.is_cancelled() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(5));
                }
                if run.is_cancelled() {
                    self.saw_cancel.lock().unwrap().push(run.run_id());
                }
            }
        }
    }

    fn manual() -> SupervisorConfig {
        SupervisorConfig {
            interval: Duration::from_secs(3600),
            start_immediately: false,
            ..SupervisorConfig::default()
        }
    }

    fn photos(ids: &[&'static str]) -> Script {
        Script {
            photos: Some(ids.to_vec()),
            ..Script::default()
        }
    }

    fn strings(title: &str) -> DisplayStrings {
        DisplayStrings {
            title: title.into(),
            subtitle: format!("{title} sub"),
            supporting_text: format!("{title} text"),
        }
    }

    fn ids(snapshot: &CatalogSnapshot) -> Vec<String> {
        snapshot.ids().map(str::to_string).collect()
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    #[test]
    fn starts_empty() {
        let (job, _) = ScriptedJob::new(vec![]);
        let supervisor = RefreshSupervisor::spawn(job, manual()).unwrap();
        assert!(supervisor.catalog().is_empty());
        assert!(supervisor.published().run_id.is_none());
        assert!(supervisor.wait_idle(WAIT));
    }

    #[test]
    fn completed_run_publishes_snapshot_and_strings_together() {
        let (job, _) = ScriptedJob::new(vec![(
            1,
            Script {
                strings: Some(strings("Spring")),
                ..photos(&["a", "b"])
            },
        )]);
        let supervisor = RefreshSupervisor::spawn(job, manual()).unwrap();
        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));

        let published = supervisor.published();
        assert_eq!(ids(&published.snapshot), vec!["a", "b"]);
        assert_eq!(published.strings.title, "Spring");
        assert_eq!(published.run_id, Some(1));
        assert!(published.published_at.is_some());
        assert_eq!(supervisor.published_runs(), vec![1]);
    }

    #[test]
    fn run_without_photos_keeps_previous_catalog_and_strings() {
        let (job, _) = ScriptedJob::new(vec![
            (
                1,
                Script {
                    strings: Some(strings("Old")),
                    ..photos(&["a"])
                },
            ),
            (
                2,
                Script {
                    strings: Some(strings("New")),
                    photos: None,
                    ..Script::default()
                },
            ),
        ]);
        let supervisor = RefreshSupervisor::spawn(job, manual()).unwrap();
        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));
        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));

        assert_eq!(ids(&supervisor.catalog()), vec!["a"]);
        assert_eq!(supervisor.strings().title, "Old");
        assert_eq!(supervisor.published_runs(), vec![1]);
        assert!(
            supervisor
                .health()
                .logs
                .iter()
                .any(|r| r.message.contains("without a catalog"))
        );
    }

    #[test]
    fn strings_missing_from_run_keep_previous_values() {
        let (job, _) = ScriptedJob::new(vec![(1, photos(&["a"]))]);
        let config = SupervisorConfig {
            initial_strings: strings("Configured"),
            ..manual()
        };
        let supervisor = RefreshSupervisor::spawn(job, config).unwrap();
        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));

        assert_eq!(supervisor.strings().title, "Configured");
        assert_eq!(ids(&supervisor.catalog()), vec!["a"]);
    }

    #[test]
    fn sequential_runs_each_publish_once() {
        let (job, _) = ScriptedJob::new(vec![(1, photos(&["a"])), (2, photos(&["b"]))]);
        let supervisor = RefreshSupervisor::spawn(job, manual()).unwrap();
        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));
        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));

        assert_eq!(supervisor.published_runs(), vec![1, 2]);
        assert_eq!(ids(&supervisor.catalog()), vec!["b"]);
    }

    // =========================================================================
    // Single flight
    // =========================================================================

    #[test]
    fn second_refresh_cancels_first_and_only_latest_publishes() {
        let (job, started) = ScriptedJob::new(vec![
            (
                1,
                Script {
                    block_until_cancelled: true,
                    ..photos(&["stale"])
                },
            ),
            (2, photos(&["fresh"])),
        ]);
        let supervisor = RefreshSupervisor::spawn(job.clone(), manual()).unwrap();

        supervisor.refresh_now();
        assert_eq!(started.recv_timeout(WAIT).unwrap(), 1);
        assert!(supervisor.health().is_active());

        supervisor.refresh_now();
        assert_eq!(started.recv_timeout(WAIT).unwrap(), 2);
        assert!(supervisor.wait_idle(WAIT));

        // Run 1 observed its cancellation; its CacheDone was ignored
        let deadline = Instant::now() + WAIT;
        while job.saw_cancel.lock().unwrap().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*job.saw_cancel.lock().unwrap(), vec![1]);
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(supervisor.published_runs(), vec![2]);
        assert_eq!(ids(&supervisor.catalog()), vec!["fresh"]);
        assert!(
            supervisor
                .health()
                .logs
                .iter()
                .any(|r| r.message == "cancelled run 1")
        );
    }

    // =========================================================================
    // Faults and scheduling
    // =========================================================================

    #[test]
    fn panicking_run_is_logged_and_recovered() {
        let (job, _) = ScriptedJob::new(vec![
            (
                1,
                Script {
                    panic: true,
                    ..photos(&["never"])
                },
            ),
            (2, photos(&["after"])),
        ]);
        let supervisor = RefreshSupervisor::spawn(job, manual()).unwrap();
        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));

        let health = supervisor.health();
        assert!(supervisor.catalog().is_empty());
        assert!(health.is_scheduled());
        assert!(
            health
                .logs
                .iter()
                .any(|r| r.level == Level::Error && r.message.contains("scripted failure"))
        );

        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));
        assert_eq!(ids(&supervisor.catalog()), vec!["after"]);
    }

    #[test]
    fn finished_run_schedules_next() {
        let (job, _) = ScriptedJob::new(vec![(1, photos(&["a"]))]);
        let supervisor = RefreshSupervisor::spawn(job, manual()).unwrap();
        assert!(!supervisor.health().is_scheduled());

        supervisor.refresh_now();
        assert!(supervisor.wait_idle(WAIT));

        let health = supervisor.health();
        assert!(!health.is_active());
        let next = health.next_run_at.unwrap();
        assert!(next > Utc::now() + chrono::Duration::minutes(59));
        assert_eq!(health.photo_count, 1);
    }

    #[test]
    fn timer_starts_next_run() {
        let (job, _) = ScriptedJob::new(vec![(1, photos(&["a"])), (2, photos(&["b"]))]);
        let config = SupervisorConfig {
            interval: Duration::from_millis(20),
            start_immediately: true,
            ..SupervisorConfig::default()
        };
        let supervisor = RefreshSupervisor::spawn(job, config).unwrap();

        let deadline = Instant::now() + WAIT;
        while supervisor.published_runs().len() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(&supervisor.published_runs()[..2], &[1, 2]);
    }

    // =========================================================================
    // Manual trigger
    // =========================================================================

    #[test]
    fn trigger_requires_fresh_token() {
        let (job, _) = ScriptedJob::new(vec![(1, photos(&["a"]))]);
        let supervisor = RefreshSupervisor::spawn(job, manual()).unwrap();

        assert!(!supervisor.trigger_refresh("forged"));
        let token = supervisor.issue_trigger_token();
        assert!(supervisor.trigger_refresh(&token));
        assert!(!supervisor.trigger_refresh(&token));
        assert!(supervisor.wait_idle(WAIT));

        assert_eq!(supervisor.published_runs(), vec![1]);
    }

    #[test]
    fn shutdown_cancels_running_refresh() {
        let (job, started) = ScriptedJob::new(vec![(
            1,
            Script {
                block_until_cancelled: true,
                ..photos(&["a"])
            },
        )]);
        let supervisor = RefreshSupervisor::spawn(job.clone(), manual()).unwrap();
        supervisor.refresh_now();
        assert_eq!(started.recv_timeout(WAIT).unwrap(), 1);

        supervisor.shutdown();

        let deadline = Instant::now() + WAIT;
        while job.saw_cancel.lock().unwrap().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(*job.saw_cancel.lock().unwrap(), vec![1]);
    }

    // =========================================================================
    // Status bookkeeping
    // =========================================================================

    #[test]
    fn queued_start_keeps_status_busy_after_earlier_run_ends() {
        let mut status = Status::new(10, 0);
        assert!(status.is_idle());

        // Second request lands before the control thread picks up the first
        status.request_start();
        status.request_start();
        status.begin_run(Utc::now());
        status.active_since = None;
        assert!(!status.is_idle());

        status.begin_run(Utc::now());
        status.active_since = None;
        assert!(status.is_idle());
    }

    #[test]
    fn published_run_history_is_bounded() {
        let mut status = Status::new(10, 0);
        let total = PUBLISHED_RUNS_KEPT as u64 + 5;
        for id in 1..=total {
            status.note_published(id);
        }
        assert_eq!(status.published_runs.len(), PUBLISHED_RUNS_KEPT);
        assert_eq!(status.published_runs.front(), Some(&6));
        assert_eq!(status.published_runs.back(), Some(&total));
    }

    #[test]
    fn panic_message_extraction() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}

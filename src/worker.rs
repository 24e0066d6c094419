//! Refresh run body and the channel protocol between a run and its supervisor.
//!
//! A run is started with [`StartParams`] and talks back only through its
//! [`RunHandle`]:
//!
//! | Event | Sent by | Meaning |
//! |---|---|---|
//! | [`WorkerEvent::Progress`] | the job, 0..n times | any subset of title, subtitle, supporting text, photo list |
//! | [`WorkerEvent::Log`] | the job, 0..n times | an operational event for the activity log |
//! | [`WorkerEvent::CacheDone`] | the run wrapper, once | the job returned |
//! | [`WorkerEvent::Fault`] | the run wrapper, once | the job panicked |
//!
//! Every event is tagged with its run id, so the supervisor can drop events
//! from runs it has already cancelled.
//!
//! The production job is [`PrewarmJob`]: strings, then catalog, then a
//! strictly sequential pre-warm of every photo at every size.

use crate::cache::PhotoCacheStore;
use crate::catalog::{CatalogError, RemoteCatalogClient};
use crate::imaging::prewarm_plan;
use crate::normalize::PhotoNormalizer;
use crate::strings::StringsSource;
use crate::types::{CatalogSnapshot, DisplayStrings};
use log::Level;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Main-image scale ratios pre-warmed for every photo. `1.0` is the original.
pub const DEFAULT_SCALE_RATIOS: [f64; 5] = [1.0, 0.75, 0.5, 0.25, 0.15];

/// Start message for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartParams {
    /// Square thumbnail edges at 1×, 1.5× and 2×.
    pub thumb_sizes: [u32; 3],
}

/// Incremental result from a run. `None` fields carry no update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub supporting_text: Option<String>,
    pub photos: Option<CatalogSnapshot>,
}

impl Progress {
    pub fn strings(strings: DisplayStrings) -> Self {
        Self {
            title: Some(strings.title),
            subtitle: Some(strings.subtitle),
            supporting_text: Some(strings.supporting_text),
            photos: None,
        }
    }

    pub fn photos(snapshot: CatalogSnapshot) -> Self {
        Self {
            photos: Some(snapshot),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Progress(Progress),
    Log(Level, String),
    CacheDone,
    Fault(String),
}

/// A [`WorkerEvent`] tagged with the run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMessage {
    pub run_id: u64,
    pub event: WorkerEvent,
}

/// Cooperative cancellation flag shared between a run and its supervisor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type Sink = Box<dyn Fn(RunMessage) + Send + Sync>;

/// A run's only way to talk back. Owned by the run's thread.
pub struct RunHandle {
    run_id: u64,
    cancel: CancelToken,
    sink: Sink,
}

impl RunHandle {
    pub fn new(
        run_id: u64,
        cancel: CancelToken,
        sink: impl Fn(RunMessage) + Send + Sync + 'static,
    ) -> Self {
        Self {
            run_id,
            cancel,
            sink: Box::new(sink),
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn report(&self, progress: Progress) {
        self.send(WorkerEvent::Progress(progress));
    }

    /// Log through the `log` facade and forward to the supervisor's activity log.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        log::log!(level, "[run {}] {}", self.run_id, message);
        self.send(WorkerEvent::Log(level, message));
    }

    pub(crate) fn send(&self, event: WorkerEvent) {
        (self.sink)(RunMessage {
            run_id: self.run_id,
            event,
        });
    }
}

/// The body of one refresh run.
///
/// Implementations report through `run` and should check
/// [`RunHandle::is_cancelled`] between units of work. The terminal event is
/// sent by the caller once `run` returns (or panics).
pub trait RefreshJob: Send + Sync {
    fn run(&self, params: &StartParams, run: &RunHandle);
}

/// Counts from one pre-warm pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrewarmSummary {
    pub photos: usize,
    pub warmed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Fetch strings, refresh the catalog, then warm the cache for every photo.
pub struct PrewarmJob {
    catalog: RemoteCatalogClient,
    normalizer: PhotoNormalizer,
    cache: Arc<PhotoCacheStore>,
    strings: Option<Box<dyn StringsSource>>,
    folder_id: String,
    ratios: Vec<f64>,
}

impl PrewarmJob {
    pub fn new(
        catalog: RemoteCatalogClient,
        normalizer: PhotoNormalizer,
        cache: Arc<PhotoCacheStore>,
        folder_id: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            normalizer,
            cache,
            strings: None,
            folder_id: folder_id.into(),
            ratios: DEFAULT_SCALE_RATIOS.to_vec(),
        }
    }

    pub fn with_strings(mut self, source: Box<dyn StringsSource>) -> Self {
        self.strings = Some(source);
        self
    }

    pub fn with_ratios(mut self, ratios: Vec<f64>) -> Self {
        self.ratios = ratios;
        self
    }

    /// Warm every planned size of every photo, one request at a time.
    ///
    /// A failed size is logged and skipped; the loop always moves on.
    pub fn prewarm(
        &self,
        snapshot: &CatalogSnapshot,
        params: &StartParams,
        run: &RunHandle,
    ) -> PrewarmSummary {
        let mut summary = PrewarmSummary {
            photos: snapshot.len(),
            ..PrewarmSummary::default()
        };

        for photo in snapshot.photos() {
            let plan = prewarm_plan((photo.width, photo.height), &self.ratios, params.thumb_sizes);
            for (width, height) in plan {
                if run.is_cancelled() {
                    summary.cancelled = true;
                    return summary;
                }
                match self.cache.get_photo(&photo.id, width, height) {
                    Ok(_) => summary.warmed += 1,
                    Err(e) => {
                        summary.failed += 1;
                        run.log(Level::Warn, format!("pre-warm skipped: {e}"));
                    }
                }
            }
        }
        summary
    }
}

impl RefreshJob for PrewarmJob {
    fn run(&self, params: &StartParams, run: &RunHandle) {
        if let Some(source) = &self.strings {
            match source.fetch() {
                Ok(strings) => run.report(Progress::strings(strings)),
                Err(e) => run.log(Level::Warn, format!("display strings not refreshed: {e}")),
            }
        }
        if run.is_cancelled() {
            return;
        }

        let raw = match self.catalog.list_catalog_until(&self.folder_id, run.cancel_token()) {
            Ok(raw) => raw,
            Err(CatalogError::Cancelled) => {
                run.log(Level::Info, "catalog refresh cancelled");
                return;
            }
            Err(e) => {
                run.log(Level::Error, format!("catalog refresh failed: {e}"));
                return;
            }
        };
        let hydrated = raw.len();
        let snapshot = self.normalizer.normalize(raw);
        run.log(
            Level::Info,
            format!("catalog has {} photos ({} listed)", snapshot.len(), hydrated),
        );
        run.report(Progress::photos(snapshot.clone()));

        let summary = self.prewarm(&snapshot, params, run);
        if summary.cancelled {
            run.log(Level::Info, "pre-warm cancelled");
        } else {
            run.log(
                Level::Info,
                format!(
                    "pre-warm finished: {} sizes warmed, {} failed across {} photos",
                    summary.warmed, summary.failed, summary.photos
                ),
            );
        }
    }
}

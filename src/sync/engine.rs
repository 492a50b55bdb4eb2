//! Sync Engine
//!
//! Drives incremental harvesting: on start it restores watermarks, then runs
//! a pass immediately and again on every scheduler tick.
//!
//! One pass, per source in configured order:
//! 1. fetch and upsert the profile (`<source>-profile`)
//! 2. fetch items (newest first) and keep those newer than the watermark
//! 3. upsert each new item (`item-<id>`); failures skip only that item
//! 4. advance the watermark to the greatest stored id, staying below any
//!    item that failed so it is retried next pass, and persist the state
//!
//! A failure inside one source never stops the other sources. Only a
//! failed session init at start crosses the engine boundary.

use crate::format::{format_item, format_profile};
use crate::source::{ItemId, SourceClient};
use crate::store::{
    item_key, profile_key, upsert_record, ContentStore, RecordMetadata, UpsertOutcome,
};
use crate::sync::error::EngineError;
use crate::sync::report::{
    FailureKind, PassOutcome, PassReport, SkipReason, SourceReport, SourceStatus, StartReport,
    StateLoad, SyncFailure,
};
use crate::sync::scheduler::{IntervalScheduler, Scheduler};
use crate::sync::watermark::{load_state, save_state, WatermarkTable};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between pass starts
    pub poll_interval: Duration,
    /// Accounts to track, in processing order
    pub sources: Vec<String>,
}

impl SyncConfig {
    /// Duplicate sources are dropped, keeping the first occurrence
    pub fn new<I, S>(poll_interval: Duration, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for source in sources {
            let source = source.into();
            if !unique.contains(&source) {
                unique.push(source);
            }
        }

        Self {
            poll_interval,
            sources: unique,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15 * 60),
            sources: Vec::new(),
        }
    }
}

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Idle,
    Starting,
    Running,
    /// The schedule ended on its own; no further passes will run
    Failed,
    Stopped,
}

/// Incremental sync engine
pub struct SyncEngine {
    source: Arc<dyn SourceClient>,
    store: Arc<dyn ContentStore>,
    config: SyncConfig,
    status: RwLock<EngineStatus>,
    watermarks: RwLock<WatermarkTable>,
    /// Held for the duration of a pass; a pass that cannot take it is skipped
    pass_lock: Mutex<()>,
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
    last_report: RwLock<Option<PassReport>>,
}

impl SyncEngine {
    /// Create an idle engine
    pub fn new(
        source: Arc<dyn SourceClient>,
        store: Arc<dyn ContentStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            status: RwLock::new(EngineStatus::Idle),
            watermarks: RwLock::new(WatermarkTable::new()),
            pass_lock: Mutex::new(()),
            scheduler_task: Mutex::new(None),
            last_report: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn status(&self) -> EngineStatus {
        *self.status.read().await
    }

    /// Current watermark of one source
    pub async fn watermark(&self, source: &str) -> Option<ItemId> {
        self.watermarks.read().await.get(source).cloned()
    }

    /// Snapshot of the whole watermark table
    pub async fn watermarks(&self) -> WatermarkTable {
        self.watermarks.read().await.clone()
    }

    /// Report of the most recent completed pass
    pub async fn last_report(&self) -> Option<PassReport> {
        self.last_report.read().await.clone()
    }

    /// Start with a fixed-interval schedule of `poll_interval`
    pub async fn start(self: &Arc<Self>) -> Result<StartReport, EngineError> {
        let scheduler = IntervalScheduler::new(self.config.poll_interval);
        self.start_with_scheduler(Box::new(scheduler)).await
    }

    /// Start the engine and hand pass triggering to `scheduler`.
    ///
    /// Initializes the source session, restores persisted watermarks and
    /// seeds missing ones from stored items. Returns once the engine is
    /// running; passes happen in the background.
    pub async fn start_with_scheduler(
        self: &Arc<Self>,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<StartReport, EngineError> {
        {
            let mut status = self.status.write().await;
            if matches!(*status, EngineStatus::Starting | EngineStatus::Running) {
                return Err(EngineError::AlreadyRunning);
            }
            *status = EngineStatus::Starting;
        }

        tracing::info!(
            sources = self.config.sources.len(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Starting sync engine"
        );

        if let Err(e) = self.source.init().await {
            tracing::error!(error = %e, "Source session initialization failed");
            let mut status = self.status.write().await;
            if *status == EngineStatus::Starting {
                *status = EngineStatus::Idle;
            }
            return Err(EngineError::Startup(e));
        }

        let mut failures = Vec::new();
        let state_load = self.restore_state(&mut failures).await;
        let seeded = self.seed_watermarks(&mut failures).await;

        let report = StartReport {
            state_load,
            seeded,
            failures,
        };

        {
            let mut status = self.status.write().await;
            if *status != EngineStatus::Starting {
                tracing::info!("Stop requested during startup, not scheduling passes");
                return Ok(report);
            }
            *status = EngineStatus::Running;
        }

        let handle = tokio::spawn(Arc::clone(self).run_schedule(scheduler));
        if let Some(previous) = self.scheduler_task.lock().await.replace(handle) {
            previous.abort();
        }

        tracing::info!("Sync engine running");

        Ok(report)
    }

    /// Stop scheduling passes.
    ///
    /// Waits for an in-flight pass, which ends at the next source boundary.
    /// Called while the engine is starting, the stop is recorded and the
    /// pending `start` returns without scheduling any pass.
    pub async fn stop(&self) {
        {
            let mut status = self.status.write().await;
            match *status {
                EngineStatus::Running | EngineStatus::Failed => {}
                EngineStatus::Starting => {
                    *status = EngineStatus::Stopped;
                    return;
                }
                EngineStatus::Idle | EngineStatus::Stopped => return,
            }
            *status = EngineStatus::Stopped;
        }

        if let Some(handle) = self.scheduler_task.lock().await.take() {
            handle.abort();
        }

        let _pass = self.pass_lock.lock().await;
        tracing::info!("Sync engine stopped");
    }

    async fn run_schedule(self: Arc<Self>, mut scheduler: Box<dyn Scheduler>) {
        while scheduler.tick().await {
            if *self.status.read().await != EngineStatus::Running {
                return;
            }

            // Passes run in their own task so a slow pass cannot delay ticks;
            // the pass lock turns overlapping triggers into skipped cycles.
            let engine = Arc::clone(&self);
            tokio::spawn(async move {
                engine.run_pass().await;
            });
        }

        let mut status = self.status.write().await;
        if *status == EngineStatus::Running {
            tracing::error!("Pass schedule ended unexpectedly, no further passes will run");
            *status = EngineStatus::Failed;
        }
    }

    async fn restore_state(&self, failures: &mut Vec<SyncFailure>) -> StateLoad {
        match load_state(self.store.as_ref()).await {
            Ok(Some(state)) => {
                let sources = self.watermarks.write().await.merge_state(state);
                tracing::info!(sources, "Restored persisted watermarks");
                StateLoad::Loaded { sources }
            }
            Ok(None) => {
                tracing::info!("No persisted state found, starting with empty watermarks");
                StateLoad::Missing
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load persisted state, starting with empty watermarks");
                failures.push(SyncFailure {
                    kind: FailureKind::StateLoadDegraded,
                    source: None,
                    item_id: None,
                    message: e.to_string(),
                });
                StateLoad::Degraded {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Seed unset watermarks from the newest item already in the store
    async fn seed_watermarks(&self, failures: &mut Vec<SyncFailure>) -> Vec<(String, ItemId)> {
        let mut seeded = Vec::new();

        for source in &self.config.sources {
            if self.watermarks.read().await.contains(source) {
                continue;
            }

            match self.store.list_items(source).await {
                Ok(records) => {
                    let newest = records
                        .into_iter()
                        .filter_map(|record| record.metadata.item_id)
                        .max();

                    if let Some(id) = newest {
                        self.watermarks.write().await.advance(source, id.clone());
                        tracing::info!(source = %source, item_id = %id, "Seeded watermark from stored items");
                        seeded.push((source.clone(), id));
                    }
                }
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Failed to seed watermark");
                    failures.push(SyncFailure::source(
                        FailureKind::StateLoadDegraded,
                        source,
                        format!("seeding failed: {}", e),
                    ));
                }
            }
        }

        seeded
    }

    /// Run one pass over every source.
    ///
    /// Skipped when the engine is not running or another pass is in flight.
    pub async fn run_pass(&self) -> PassOutcome {
        let Ok(_pass) = self.pass_lock.try_lock() else {
            tracing::warn!("Previous pass still in flight, skipping this cycle");
            return PassOutcome::Skipped(SkipReason::InFlight);
        };

        if *self.status.read().await != EngineStatus::Running {
            return PassOutcome::Skipped(SkipReason::NotRunning);
        }

        let start = Instant::now();
        let mut report = PassReport::new(Utc::now());
        tracing::info!(sources = self.config.sources.len(), "Starting sync pass");

        for source in &self.config.sources {
            if *self.status.read().await != EngineStatus::Running {
                tracing::info!("Engine stopping, ending pass early");
                report.cancelled = true;
                break;
            }

            report.sources.push(self.sync_source(source).await);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            records_written = report.records_written(),
            failures = report.failures().count(),
            duration_ms = report.duration_ms,
            "Sync pass completed"
        );

        *self.last_report.write().await = Some(report.clone());
        PassOutcome::Completed(report)
    }

    async fn sync_source(&self, source: &str) -> SourceReport {
        let mut report = SourceReport::new(source);

        if let Err(failure) = self.process_source(source, &mut report).await {
            tracing::warn!(
                source,
                kind = ?failure.kind,
                error = %failure.message,
                "Source sync failed"
            );
            report.status = SourceStatus::Failed;
            report.failures.push(failure);
        }

        report
    }

    async fn process_source(
        &self,
        source: &str,
        report: &mut SourceReport,
    ) -> Result<(), SyncFailure> {
        let transient =
            |message: String| SyncFailure::source(FailureKind::SourceTransient, source, message);

        let profile = self
            .source
            .get_profile(source)
            .await
            .map_err(|e| transient(format!("profile fetch failed: {}", e)))?
            .ok_or_else(|| transient("profile not found".to_string()))?;

        let outcome = upsert_record(
            self.store.as_ref(),
            &profile_key(source),
            &format_profile(&profile),
            RecordMetadata::profile(source),
        )
        .await
        .map_err(|e| transient(format!("profile store failed: {}", e)))?;
        report.profile = Some(outcome);

        let items = self
            .source
            .get_items(source)
            .await
            .map_err(|e| transient(format!("item fetch failed: {}", e)))?;
        report.items_fetched = items.len();

        if items.is_empty() {
            tracing::debug!(source, "No items returned");
            report.status = SourceStatus::NoItems;
            return Ok(());
        }

        let new_items = self.watermarks.read().await.filter_new(source, &items);
        report.items_new = new_items.len();

        // Oldest item that failed to store; the watermark must stay below it
        let mut oldest_failure: Option<&ItemId> = None;

        for item in new_items.iter().copied() {
            let Some(id) = item.id.as_ref() else {
                report.items_skipped += 1;
                continue;
            };

            match upsert_record(
                self.store.as_ref(),
                &item_key(id),
                &format_item(item),
                RecordMetadata::item(source, id.clone()),
            )
            .await
            {
                Ok(UpsertOutcome::Unchanged) => report.items_unchanged += 1,
                Ok(_) => report.items_stored += 1,
                Err(e) => {
                    let payload =
                        serde_json::to_string(item).unwrap_or_else(|_| format!("{:?}", item));
                    tracing::error!(
                        source,
                        item_id = %id,
                        item = %payload,
                        error = %e,
                        "Failed to store item"
                    );
                    report.items_failed += 1;
                    report.failures.push(SyncFailure::item(source, id, e.to_string()));
                    if oldest_failure.map_or(true, |oldest| id < oldest) {
                        oldest_failure = Some(id);
                    }
                }
            }
        }

        tracing::debug!(
            source,
            fetched = report.items_fetched,
            new = report.items_new,
            stored = report.items_stored,
            "Processed items"
        );

        let newest = new_items
            .iter()
            .copied()
            .filter_map(|item| item.id.as_ref())
            .filter(|id| oldest_failure.map_or(true, |oldest| *id < oldest))
            .max()
            .cloned();
        let Some(newest) = newest else {
            return Ok(());
        };

        let state = {
            let mut watermarks = self.watermarks.write().await;
            if !watermarks.advance(source, newest.clone()) {
                return Ok(());
            }
            watermarks.to_state()
        };
        tracing::info!(source, item_id = %newest, "Watermark advanced");
        report.watermark = Some(newest);

        save_state(self.store.as_ref(), &state).await.map_err(|e| {
            SyncFailure::source(
                FailureKind::StatePersistFailure,
                source,
                format!("state save failed: {}", e),
            )
        })?;
        report.state_persisted = true;

        Ok(())
    }
}

//! Sync outcomes
//!
//! Contained failures are reported as values so callers can inspect what a
//! start or a pass did without parsing logs.

use crate::source::ItemId;
use crate::store::UpsertOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Kind of a contained failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Profile fetch, item fetch or profile write failed; source skipped for the pass
    SourceTransient,
    /// One item could not be stored; item skipped
    ItemTransient,
    /// Persisted state or stored items could not be read at startup
    StateLoadDegraded,
    /// Saving the state after an advance failed; advance kept in memory
    StatePersistFailure,
}

/// A failure that was logged and contained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub source: Option<String>,
    pub item_id: Option<ItemId>,
    pub message: String,
}

impl SyncFailure {
    pub fn source(kind: FailureKind, source: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: Some(source.to_string()),
            item_id: None,
            message: message.into(),
        }
    }

    pub fn item(source: &str, item_id: &ItemId, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ItemTransient,
            source: Some(source.to_string()),
            item_id: Some(item_id.clone()),
            message: message.into(),
        }
    }
}

/// How reading the persisted state went at startup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StateLoad {
    /// State found; `sources` watermarks applied
    Loaded { sources: usize },
    /// Nothing persisted yet
    Missing,
    /// State unreadable; started from an empty table
    Degraded { error: String },
}

/// What `start` did before the first pass
#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub state_load: StateLoad,
    /// Watermarks seeded from previously stored items
    pub seeded: Vec<(String, ItemId)>,
    pub failures: Vec<SyncFailure>,
}

/// Per-source result of one pass
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub status: SourceStatus,
    /// Profile record write, if the profile was fetched
    pub profile: Option<UpsertOutcome>,
    pub items_fetched: usize,
    pub items_new: usize,
    /// New items written (created or replaced)
    pub items_stored: usize,
    /// New items whose identical record already existed
    pub items_unchanged: usize,
    /// New items dropped for lack of an identifier
    pub items_skipped: usize,
    pub items_failed: usize,
    /// Watermark after this pass, if it advanced
    pub watermark: Option<ItemId>,
    pub state_persisted: bool,
    pub failures: Vec<SyncFailure>,
}

/// Overall status of one source in a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Ran to the end; individual items may still have failed
    Completed,
    /// Feed was empty
    NoItems,
    /// Aborted by a source-level failure
    Failed,
}

impl SourceReport {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Completed,
            profile: None,
            items_fetched: 0,
            items_new: 0,
            items_stored: 0,
            items_unchanged: 0,
            items_skipped: 0,
            items_failed: 0,
            watermark: None,
            state_persisted: false,
            failures: Vec::new(),
        }
    }

    /// Records written for this source, profile included
    pub fn records_written(&self) -> usize {
        let profile = self.profile.map(|p| p.wrote() as usize).unwrap_or(0);
        profile + self.items_stored
    }
}

/// Result of one full pass over all sources
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub sources: Vec<SourceReport>,
    /// The engine was stopped before every source ran
    pub cancelled: bool,
}

impl PassReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            sources: Vec::new(),
            cancelled: false,
        }
    }

    pub fn source(&self, source: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == source)
    }

    pub fn records_written(&self) -> usize {
        self.sources.iter().map(SourceReport::records_written).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncFailure> {
        self.sources.iter().flat_map(|s| s.failures.iter())
    }

    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures().filter(|f| f.kind == kind).count()
    }
}

/// Why `run_pass` did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another pass is still running
    InFlight,
    /// The engine is not running
    NotRunning,
}

/// Result of a pass request
#[derive(Debug, Clone)]
pub enum PassOutcome {
    Completed(PassReport),
    Skipped(SkipReason),
}

impl PassOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped(_) => None,
        }
    }

    pub fn into_report(self) -> Option<PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped(_) => None,
        }
    }
}

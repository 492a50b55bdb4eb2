//! Incremental Sync
//!
//! The core of Gleaner: scheduling, per-source watermarks, dedup-aware
//! upserts and state recovery.
//!
//! - **engine**: `SyncEngine` lifecycle and the per-source pass pipeline
//! - **watermark**: `WatermarkTable` and its persisted form `EngineState`
//! - **scheduler**: pass triggers (`IntervalScheduler`, `ManualScheduler`)
//! - **report**: typed outcomes of starts and passes
//! - **error**: `EngineError`
//!
//! # Recovery
//!
//! ```text
//! start:  init session → load EngineState → seed unset watermarks → Running
//! pass:   profile → items → filter by watermark → upsert → advance → save
//! ```
//!
//! The state is saved after every source that advanced, so a crash loses at
//! most one source's advance. Re-processing after such a crash writes
//! nothing because unchanged records are skipped.

pub mod engine;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod watermark;

pub use engine::{EngineStatus, SyncConfig, SyncEngine};
pub use error::EngineError;
pub use report::{
    FailureKind, PassOutcome, PassReport, SkipReason, SourceReport, SourceStatus, StartReport,
    StateLoad, SyncFailure,
};
pub use scheduler::{IntervalScheduler, ManualScheduler, ManualTrigger, Scheduler};
pub use watermark::{load_state, save_state, EngineState, WatermarkTable, STATE_KEY};

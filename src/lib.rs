//! # Gleaner
//!
//! Incremental content harvester: polls a fixed set of external accounts on
//! a timer, renders each new item as canonical text and upserts it into a
//! content store without duplicate or redundant writes.
//!
//! ## Features
//!
//! - **Incremental**: per-source watermarks, only newer items are processed
//! - **Idempotent**: records with unchanged text are never rewritten
//! - **Crash consistent**: state is saved after every source that advanced
//! - **Isolated failures**: one bad source or item never stops a pass
//!
//! ## Modules
//!
//! - [`sync`]: Sync engine, watermarks, scheduling
//! - [`source`]: Source account client abstraction
//! - [`store`]: Content store abstraction and backends
//! - [`format`]: Canonical text rendering
//! - [`config`]: File and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gleaner::source::{HttpSourceClient, HttpSourceConfig};
//! use gleaner::store::SqliteStore;
//! use gleaner::sync::{SyncConfig, SyncEngine};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(HttpSourceClient::new(HttpSourceConfig {
//!         token: "secret".to_string(),
//!         ..Default::default()
//!     })?);
//!     let store = Arc::new(SqliteStore::open("content.db".as_ref())?);
//!
//!     let config = SyncConfig::new(Duration::from_secs(900), ["alice", "bob"]);
//!     let engine = Arc::new(SyncEngine::new(source, store, config));
//!
//!     // Runs a pass now, then every 15 minutes
//!     engine.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     engine.stop().await;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod format;
pub mod source;
pub mod store;
pub mod sync;

// Re-export top-level types for convenience
pub use source::{HttpSourceClient, Item, ItemId, Profile, SourceClient, SourceError};

pub use store::{
    upsert_record, ContentRecord, ContentStore, MemoryStore, RecordKind, RecordMetadata,
    SqliteStore, StoreError, StoreResult, UpsertOutcome,
};

pub use sync::{
    EngineError, EngineState, EngineStatus, FailureKind, PassOutcome, PassReport, StartReport,
    SyncConfig, SyncEngine, SyncFailure, WatermarkTable,
};

pub use format::{format_item, format_profile};

pub use config::{
    Config, ConfigError, ConfigOrigin, EngineConfig, LoadedConfig, LoggingConfig, SourceConfig,
    StoreConfig,
};

//! Engine error types

use crate::source::SourceError;
use thiserror::Error;

/// Errors returned across the engine boundary.
///
/// Everything else that can go wrong during a pass is contained and
/// reported as a [`SyncFailure`](super::SyncFailure).
#[derive(Error, Debug)]
pub enum EngineError {
    /// `start` called while the engine is starting or running
    #[error("Engine is already running")]
    AlreadyRunning,

    /// Source session could not be established
    #[error("Source session initialization failed: {0}")]
    Startup(#[source] SourceError),
}

//! Source Accounts
//!
//! This module abstracts the external service content is harvested from:
//! - `SourceClient`: session setup, profile and item fetching
//! - `HttpSourceClient`: JSON-over-HTTP implementation
//! - `types`: `Profile`, `Item`, `ItemId`

mod http;
mod types;

pub use http::{HttpSourceClient, HttpSourceConfig};
pub use types::{Item, ItemId, Media, Profile};

use async_trait::async_trait;

/// Access to the accounts being tracked.
///
/// The session is created once by `init` and reused for every pass.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Establish the session. Bad credentials fail with `AuthFailed`.
    async fn init(&self) -> Result<(), SourceError>;

    /// Fetch an account profile, `None` if the account does not exist
    async fn get_profile(&self, source: &str) -> Result<Option<Profile>, SourceError>;

    /// Fetch the latest items of an account, newest first
    async fn get_items(&self, source: &str) -> Result<Vec<Item>, SourceError>;
}

/// Errors that can occur while talking to a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Session not initialized")]
    NotInitialized,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request timeout")]
    Timeout,
}

impl SourceError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::RateLimited(_) | SourceError::Timeout => true,
            SourceError::Api { status, .. } => *status >= 500,
            SourceError::Request(e) => e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SourceError::AuthFailed("bad token".to_string());
        assert_eq!(err.to_string(), "Authentication failed: bad token");

        let err = SourceError::Api {
            status: 503,
            message: "down".to_string(),
        };
        assert_eq!(err.to_string(), "API error 503: down");
    }

    #[test]
    fn test_retryable() {
        assert!(SourceError::Timeout.is_retryable());
        assert!(SourceError::RateLimited(5).is_retryable());
        assert!(SourceError::Api {
            status: 502,
            message: String::new()
        }
        .is_retryable());
        assert!(!SourceError::Api {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!SourceError::AuthFailed(String::new()).is_retryable());
    }
}

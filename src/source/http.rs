//! HTTP Source Client
//!
//! Talks to a JSON account API:
//! - `GET /v1/session` validates the bearer token
//! - `GET /v1/accounts/{id}/profile`
//! - `GET /v1/accounts/{id}/items` returns `{"items": [...]}`, newest first

use super::*;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;

/// Longest Retry-After we are willing to sleep inside a single call
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// HTTP-backed source client
pub struct HttpSourceClient {
    client: Client,
    config: HttpSourceConfig,
    session: RwLock<Option<Session>>,
}

/// Configuration for the HTTP source client
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Base URL of the account API (e.g., "http://localhost:8090")
    pub base_url: String,
    /// Bearer token
    pub token: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum attempts per call, including the first
    pub max_retries: u32,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            token: String::new(),
            request_timeout_ms: 10_000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Session {
    account: String,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<Option<Item>>,
}

impl HttpSourceClient {
    /// Create a new client. No request is made until `init`.
    pub fn new(config: HttpSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("gleaner/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            config,
            session: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn account_url(&self, source: &str, resource: &str) -> String {
        self.url(&format!(
            "/v1/accounts/{}/{}",
            urlencoding::encode(source),
            resource
        ))
    }

    async fn ensure_session(&self) -> Result<(), SourceError> {
        if self.session.read().await.is_some() {
            Ok(())
        } else {
            Err(SourceError::NotInitialized)
        }
    }

    /// GET a JSON document, `None` on 404. Retries transient failures with
    /// quadratic backoff, up to `max_retries` attempts.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, SourceError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = SourceError::Timeout;

        for attempt in 0..attempts {
            let delay = backoff_delay(attempt, &last_error);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.get_once(url).await {
                Ok(value) => return Ok(value),
                Err(SourceError::RateLimited(secs)) if attempt + 1 < attempts => {
                    tracing::debug!(url, retry_after = secs, "Source rate limited");
                    tokio::time::sleep(Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
                        .await;
                    last_error = SourceError::RateLimited(secs);
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(url, attempt, error = %e, "Source request failed, retrying");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, SourceError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout
                } else {
                    SourceError::Request(e)
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SourceError::AuthFailed(format!(
                    "{} returned {}",
                    url,
                    response.status()
                )));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(5);
                return Err(SourceError::RateLimited(retry_after));
            }
            status if !status.is_success() => {
                let message = response.text().await.unwrap_or_default();
                return Err(SourceError::Api {
                    status: status.as_u16(),
                    message,
                });
            }
            _ => {}
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        Ok(Some(body))
    }
}

/// Pause before `attempt`: 1s, 4s, 9s... A rate-limited attempt already
/// waited out its Retry-After, so the next one goes straight away.
fn backoff_delay(attempt: u32, last_error: &SourceError) -> Duration {
    if attempt == 0 || matches!(last_error, SourceError::RateLimited(_)) {
        Duration::ZERO
    } else {
        Duration::from_secs((attempt as u64).pow(2))
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn init(&self) -> Result<(), SourceError> {
        if self.config.token.is_empty() {
            return Err(SourceError::AuthFailed("No API token configured".into()));
        }

        let session: Session = self
            .get_json(&self.url("/v1/session"))
            .await?
            .ok_or_else(|| SourceError::AuthFailed("Session endpoint not found".into()))?;

        tracing::info!(account = %session.account, "Source session established");
        *self.session.write().await = Some(session);

        Ok(())
    }

    async fn get_profile(&self, source: &str) -> Result<Option<Profile>, SourceError> {
        self.ensure_session().await?;
        self.get_json(&self.account_url(source, "profile")).await
    }

    async fn get_items(&self, source: &str) -> Result<Vec<Item>, SourceError> {
        self.ensure_session().await?;

        let Some(response) = self
            .get_json::<ItemsResponse>(&self.account_url(source, "items"))
            .await?
        else {
            return Ok(Vec::new());
        };

        let total = response.items.len();
        let items: Vec<Item> = response.items.into_iter().flatten().collect();
        if items.len() < total {
            tracing::debug!(source, dropped = total - items.len(), "Dropped null items");
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> HttpSourceClient {
        HttpSourceClient::new(HttpSourceConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = HttpSourceConfig::default();
        assert_eq!(config.base_url, "http://localhost:8090");
        assert_eq!(config.max_retries, 3);
        assert!(config.token.is_empty());
    }

    #[test]
    fn test_backoff_delay() {
        let timeout = SourceError::Timeout;
        assert_eq!(backoff_delay(0, &timeout), Duration::ZERO);
        assert_eq!(backoff_delay(1, &timeout), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, &timeout), Duration::from_secs(4));

        let limited = SourceError::RateLimited(30);
        assert_eq!(backoff_delay(2, &limited), Duration::ZERO);
    }

    #[test]
    fn test_account_url_encodes_source() {
        let client = client("http://api.local/");
        assert_eq!(
            client.account_url("some user", "items"),
            "http://api.local/v1/accounts/some%20user/items"
        );
        assert_eq!(
            client.account_url("alice", "profile"),
            "http://api.local/v1/accounts/alice/profile"
        );
    }

    #[test]
    fn test_items_response_tolerates_nulls() {
        let response: ItemsResponse =
            serde_json::from_str(r#"{"items": [{"id": "2"}, null, {"id": "1"}]}"#).unwrap();
        let items: Vec<Item> = response.items.into_iter().flatten().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, Some(ItemId::new("2")));
    }

    #[tokio::test]
    async fn test_init_without_token_fails() {
        let client = client("http://127.0.0.1:9");
        let err = client.init().await.unwrap_err();
        assert!(matches!(err, SourceError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_fetch_before_init_fails() {
        let client = client("http://127.0.0.1:9");
        let err = client.get_items("alice").await.unwrap_err();
        assert!(matches!(err, SourceError::NotInitialized));
    }
}

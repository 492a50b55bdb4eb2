//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::source::HttpSourceConfig;
use crate::sync::SyncConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sync engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub sources: Vec<String>,
}

fn default_poll_interval() -> u64 {
    900 // 15 minutes
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            sources: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig::new(self.poll_interval(), self.sources.iter().cloned())
    }
}

/// Source account API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub base_url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_source_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_url(),
            token: String::new(),
            request_timeout_ms: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl SourceConfig {
    pub fn to_client_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            request_timeout_ms: self.request_timeout_ms,
            max_retries: self.max_retries,
        }
    }
}

/// Content store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("gleaner").join("content.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./gleaner_data/content.db".to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// Store path with a leading `~` expanded to the home directory
    pub fn resolved_path(&self) -> PathBuf {
        match (self.path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.path),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Candidate config files, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("gleaner").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/gleaner/config.toml"));
        paths.push(PathBuf::from("./config.toml"));
        paths
    }

    /// Load from default locations or environment.
    ///
    /// Nothing is logged here since this runs before logging is set up;
    /// see [`LoadedConfig::log`].
    pub fn load_default() -> LoadedConfig {
        Self::load_first(&Self::default_paths())
    }

    fn load_first(paths: &[PathBuf]) -> LoadedConfig {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return LoadedConfig {
                        config,
                        origin: ConfigOrigin::File(path.clone()),
                        skipped,
                    };
                }
                Err(e) => skipped.push(e),
            }
        }

        LoadedConfig {
            config: Self::from_env(),
            origin: ConfigOrigin::Defaults,
            skipped,
        }
    }

    /// Check values that would make the engine misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "engine.poll_interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.engine.sources.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "engine.sources must not contain empty identifiers".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Engine overrides
        if let Some(sources) = var("GLEANER_SOURCES") {
            self.engine.sources = sources
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(interval) = var("GLEANER_POLL_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse() {
                self.engine.poll_interval_secs = secs;
            }
        }

        // Source overrides
        if let Some(url) = var("GLEANER_SOURCE_URL") {
            self.source.base_url = url;
        }
        if let Some(token) = var("GLEANER_SOURCE_TOKEN") {
            self.source.token = token;
        }

        // Store overrides
        if let Some(path) = var("GLEANER_STORE_PATH") {
            self.store.path = path;
        }

        // Logging overrides
        if let Some(level) = var("GLEANER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("GLEANER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// No usable file, built-in defaults plus environment
    Defaults,
}

/// Result of the default config lookup
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub origin: ConfigOrigin,
    /// Files that exist but could not be loaded
    pub skipped: Vec<ConfigError>,
}

impl LoadedConfig {
    /// Config loaded from an explicit path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            config: Config::load_with_env(path)?,
            origin: ConfigOrigin::File(path.to_path_buf()),
            skipped: Vec::new(),
        })
    }

    /// Report how the config was found. Call once logging is initialized.
    pub fn log(&self) {
        for error in &self.skipped {
            tracing::warn!("Skipped config file: {}", error);
        }
        match &self.origin {
            ConfigOrigin::File(path) => tracing::info!("Loaded config from {:?}", path),
            ConfigOrigin::Defaults => {
                tracing::info!("Using default config with environment overrides")
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Gleaner Configuration
#
# Environment variables override these settings:
# - GLEANER_SOURCES (comma separated)
# - GLEANER_POLL_INTERVAL_SECS
# - GLEANER_SOURCE_URL
# - GLEANER_SOURCE_TOKEN
# - GLEANER_STORE_PATH
# - GLEANER_LOG_LEVEL
# - GLEANER_LOG_FORMAT

[engine]
# Seconds between the start of two passes
poll_interval_secs = 900

# Accounts to track, processed in this order
sources = []

[source]
# Account API base URL
base_url = "http://localhost:8090"

# Bearer token for the account API
token = ""

# Request timeout in milliseconds
request_timeout_ms = 10000

# Attempts per request, including the first
max_retries = 3

[store]
# SQLite database holding harvested content
path = "~/.local/share/gleaner/content.db"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.poll_interval(), Duration::from_secs(900));
        assert!(config.engine.sources.is_empty());
        assert_eq!(config.source.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.store.path.ends_with("content.db"));
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.engine.poll_interval_secs, 900);
        assert_eq!(config.source.base_url, "http://localhost:8090");
        assert_eq!(config.logging.format, "pretty");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [engine]
            sources = ["alice", "bob", "alice"]
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.poll_interval_secs, 900);
        let sync = config.engine.to_sync_config();
        assert_eq!(sync.sources, vec!["alice", "bob"]);
        assert_eq!(sync.poll_interval, Duration::from_secs(900));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.engine.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.engine.sources = vec!["alice".to_string(), " ".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GLEANER_SOURCES", "alice, bob,,carol"),
            ("GLEANER_POLL_INTERVAL_SECS", "60"),
            ("GLEANER_SOURCE_TOKEN", "secret"),
            ("GLEANER_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.engine.sources, vec!["alice", "bob", "carol"]);
        assert_eq!(config.engine.poll_interval_secs, 60);
        assert_eq!(config.source.token, "secret");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.source.base_url, "http://localhost:8090");
    }

    #[test]
    fn test_store_path_expands_home() {
        let store = StoreConfig {
            path: "~/data/content.db".to_string(),
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(store.resolved_path(), home.join("data/content.db"));
        }

        let store = StoreConfig {
            path: "/var/lib/gleaner.db".to_string(),
        };
        assert_eq!(store.resolved_path(), PathBuf::from("/var/lib/gleaner.db"));
    }

    #[test]
    fn test_load_first_skips_broken_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "[engine\nsources = ").unwrap();
        std::fs::write(&good, "[engine]\npoll_interval_secs = 42\n").unwrap();

        let loaded = Config::load_first(&[missing.clone(), broken, good.clone()]);
        assert_eq!(loaded.origin, ConfigOrigin::File(good));
        assert_eq!(loaded.skipped.len(), 1);
        assert!(matches!(loaded.skipped[0], ConfigError::Parse { .. }));
        assert_eq!(loaded.config.engine.poll_interval_secs, 42);

        let loaded = Config::load_first(&[missing]);
        assert_eq!(loaded.origin, ConfigOrigin::Defaults);
        assert!(loaded.skipped.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[source]\ntoken = \"abc\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.token, "abc");
        assert_eq!(config.source.to_client_config().token, "abc");

        let missing = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        std::fs::write(&path, "[engine\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}

//! Engine configuration and the endpoint store
//!
//! The engine takes an explicit [`TransferConfig`]; there is no process-wide
//! state. Endpoint credentials live in a TOML file under the user config
//! directory (`~/.config/artx/config.toml`), overridable with the
//! `ARTX_CONFIG_DIR` environment variable for tests and scripting.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumAlgorithm;
use crate::error::{Error, Result};

/// Read/write chunk size for local file streaming (256 KiB)
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Tunables for one transfer invocation
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum number of transfer units in flight at once
    pub max_concurrency: usize,
    /// Total attempts per unit, including the first
    pub max_retry_attempts: u32,
    /// Base delay before the first retry; doubles per attempt
    pub retry_initial_backoff_ms: u64,
    /// Cap on the backoff delay
    pub retry_max_backoff_ms: u64,
    /// Timeout per network operation, not per unit
    pub per_operation_timeout: Duration,
    /// Algorithm preference for integrity verification, strongest first
    pub checksum_preference: Vec<ChecksumAlgorithm>,
    /// Maximum items requested per search query page
    pub max_query_page_size: u64,
    /// Settle units as Skipped when the destination already matches
    pub skip_unchanged: bool,
    /// Treat checksum mismatches as retriable (off by default; a corrupted
    /// source is not expected to heal on retry)
    pub retry_on_integrity_failure: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            max_retry_attempts: 3,
            retry_initial_backoff_ms: 100,
            retry_max_backoff_ms: 10_000,
            per_operation_timeout: Duration::from_secs(30 * 60),
            checksum_preference: ChecksumAlgorithm::PREFERENCE.to_vec(),
            max_query_page_size: 1000,
            skip_unchanged: false,
            retry_on_integrity_failure: false,
        }
    }
}

impl TransferConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_backoff_ms: self.retry_initial_backoff_ms,
            max_backoff_ms: self.retry_max_backoff_ms,
        }
    }
}

/// Retry budget shared by the scheduler and the query planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }
}

/// One named Artifactory endpoint with its credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Base URL including the context segment, e.g. `https://host/artifactory`
    pub url: String,
    /// Bearer token (preferred)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Legacy X-JFrog-Art-Api key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    endpoints: BTreeMap<String, Endpoint>,
}

/// Loads and persists the endpoint store
#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    file: ConfigFile,
}

impl ConfigManager {
    /// Load from the default location, creating an empty store if the file
    /// does not exist yet
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os("ARTX_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("cannot determine config directory".into()))?
                .join("artx"),
        };
        Self::load_from(&dir)
    }

    /// Load from an explicit directory
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join("config.toml");
        let file = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
        } else {
            ConfigFile::default()
        };
        Ok(Self { path, file })
    }

    pub fn get(&self, name: &str) -> Result<&Endpoint> {
        self.file
            .endpoints
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("endpoint '{name}'")))
    }

    /// Find the endpoint whose URL matches the given host, used to attach
    /// credentials when the caller pastes a full artifact URL
    pub fn endpoint_for_host(&self, host: &str) -> Option<&Endpoint> {
        self.file.endpoints.values().find(|e| {
            url::Url::parse(&e.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(host)))
                .unwrap_or(false)
        })
    }

    pub fn set(&mut self, name: &str, endpoint: Endpoint) {
        self.file.endpoints.insert(name.to_string(), endpoint);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.file.endpoints.remove(name).is_some()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (&str, &Endpoint)> {
        self.file.endpoints.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(&self.file)
            .map_err(|e| Error::Config(format!("serialize config: {e}")))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

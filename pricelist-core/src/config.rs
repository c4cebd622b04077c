//! Catalog configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. Environment (`PRICELIST_SOURCE_URL`, `PRICELIST_CACHE_TTL_SECONDS`)
//! 2. `config.yaml` at an explicit path, or in the platform config directory
//! 3. Built-in defaults
//!
//! ```yaml
//! spreadsheet_id: 1yccQUPQh8X_JZg8W8BeJQHZVPan6zb1c
//! cache_ttl_seconds: 600
//! fetch:
//!   max_attempts: 3
//!   timeout_seconds: 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CatalogError, Result};

/// Environment variable overriding the workbook URL
pub const ENV_SOURCE_URL: &str = "PRICELIST_SOURCE_URL";

/// Environment variable overriding the cache TTL
pub const ENV_CACHE_TTL: &str = "PRICELIST_CACHE_TTL_SECONDS";

/// Top-level catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Explicit workbook export URL
    #[serde(default)]
    pub source_url: Option<String>,

    /// Google Sheets document id, used when `source_url` is not set
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// Maximum age of a cached workbook before it is fetched again
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Decorative rows above the real header in every sheet
    #[serde(default = "default_banner_rows")]
    pub banner_rows: usize,

    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            spreadsheet_id: None,
            cache_ttl_seconds: default_cache_ttl(),
            banner_rows: default_banner_rows(),
            fetch: FetchConfig::default(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_banner_rows() -> usize {
    1
}

/// HTTP fetch and retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further retry
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Overall bound on one attempt, body download included
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Client identity sent on every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_initial_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    8_000
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_user_agent() -> String {
    concat!("pricelist/", env!("CARGO_PKG_VERSION")).to_string()
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self
            .backoff_initial_ms
            .saturating_mul(factor)
            .min(self.backoff_max_ms);
        Duration::from_millis(millis)
    }
}

impl CatalogConfig {
    /// Config for an explicit workbook URL with every other setting defaulted
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            source_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Load from the platform config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    /// Load from a YAML file; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                CatalogError::Config(format!("Failed to read {}: {e}", path.display()))
            })?;
            Self::from_yaml(&content).map_err(|e| match e {
                CatalogError::Config(msg) => {
                    CatalogError::Config(format!("{}: {msg}", path.display()))
                }
                other => other,
            })?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        Ok(config.with_env_overrides())
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content)
            .map_err(|e| CatalogError::Config(format!("Failed to parse config: {e}")))
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fedus", "pricelist")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn with_env_overrides(self) -> Self {
        self.apply_overrides(
            std::env::var(ENV_SOURCE_URL).ok(),
            std::env::var(ENV_CACHE_TTL).ok(),
        )
    }

    fn apply_overrides(mut self, source_url: Option<String>, ttl: Option<String>) -> Self {
        if let Some(url) = source_url.filter(|u| !u.trim().is_empty()) {
            self.source_url = Some(url);
        }
        if let Some(raw) = ttl {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.cache_ttl_seconds = secs,
                Err(_) => tracing::warn!("Ignoring invalid {}={:?}", ENV_CACHE_TTL, raw),
            }
        }
        self
    }

    /// The workbook export URL this config points at
    pub fn resolved_url(&self) -> Result<String> {
        if let Some(url) = &self.source_url {
            return Ok(url.clone());
        }
        if let Some(id) = &self.spreadsheet_id {
            return Ok(format!(
                "https://docs.google.com/spreadsheets/d/{id}/export?format=xlsx"
            ));
        }
        Err(CatalogError::Config(
            "Either source_url or spreadsheet_id must be set".to_string(),
        ))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.resolved_url()?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CatalogError::Config(format!(
                "Workbook URL must start with http:// or https://, got {url}"
            )));
        }
        if self.cache_ttl_seconds == 0 {
            return Err(CatalogError::Config(
                "cache_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        if self.fetch.max_attempts == 0 {
            return Err(CatalogError::Config(
                "fetch.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_seconds == 0 {
            return Err(CatalogError::Config(
                "fetch.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

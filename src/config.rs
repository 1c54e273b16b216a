//! Configuration types for dataset-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Download behavior configuration (post-processing, concurrency, transfer backend)
///
/// Used as a nested sub-config within [`Config`]. These values become the
/// default [`DispatchOptions`](crate::types::DispatchOptions) of a dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Extract archives after download (default: true)
    #[serde(default = "default_true")]
    pub unzip: bool,

    /// Delete archives after a successful extraction (default: true)
    #[serde(default = "default_true")]
    pub delete_after: bool,

    /// Number of concurrent workers (default: 1)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Which transfer mechanism fetches remote sources
    #[serde(default)]
    pub transfer: TransferBackend,

    /// Connect timeout for the library transfer (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent by the library transfer
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            unzip: true,
            delete_after: true,
            workers: default_workers(),
            transfer: TransferBackend::default(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Transfer mechanism used for remote sources
///
/// Both backends resume partial files and are interchangeable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferBackend {
    /// In-process HTTP client (default)
    #[default]
    Http,
    /// External `curl` binary
    Curl,
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to curl executable (auto-detected if None)
    #[serde(default)]
    pub curl_path: Option<PathBuf>,

    /// Path to tar executable (auto-detected if None)
    #[serde(default)]
    pub tar_path: Option<PathBuf>,

    /// Extract tarballs with the external tar tool when one is available (default: true)
    ///
    /// When false, or when no tar binary is found, tarballs are unpacked in-process.
    #[serde(default = "default_true")]
    pub external_tar: bool,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            curl_path: None,
            tar_path: None,
            external_tar: true,
            search_path: true,
        }
    }
}

/// Retry configuration for failed transfers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first one (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Archive extraction configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Zip entries whose path contains any of these fragments are not extracted
    #[serde(default = "default_junk_markers")]
    pub junk_markers: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            junk_markers: default_junk_markers(),
        }
    }
}

/// Main configuration for a [`Dispatcher`](crate::Dispatcher)
///
/// `download` and `tools` are flattened, so a JSON config reads:
///
/// ```json
/// {
///   "workers": 8,
///   "delete_after": false,
///   "transfer": "curl",
///   "retry": { "max_retries": 5 },
///   "extraction": { "junk_markers": [".DS_Store", "__MACOSX", "Thumbs.db"] }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Retry and backoff settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Archive extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no dispatcher can run with
    pub fn validate(&self) -> Result<()> {
        if self.download.workers == 0 {
            return Err(Error::Config {
                message: "workers must be at least 1".to_string(),
                key: Some("workers".to_string()),
            });
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff_multiplier must be a finite number >= 1.0, got {}",
                    multiplier
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("dataset-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_junk_markers() -> Vec<String> {
    vec![".DS_Store".to_string(), "__MACOSX".to_string()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

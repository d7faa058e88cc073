//! # Configuration Module
//!
//! Data directory layout and runtime settings.
//!
//! Soundscope keeps its corpus database in the platform-standard data
//! directory:
//! - Linux: `~/.local/share/soundscope/`
//! - macOS: `~/Library/Application Support/soundscope/`
//! - Windows: `%APPDATA%\soundscope\`
//!
//! An optional `config.json` next to the database selects a different
//! database and enables the remote vector index. Command-line flags and
//! environment variables override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "soundscope";
const DB_FILE: &str = "corpus.db";
const CONFIG_FILE: &str = "config.json";

/// Default bound on a remote index round trip.
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 2_000;

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The soundscope subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create Soundscope data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Returns the default corpus database path inside [`get_data_dir`].
///
/// # Examples
///
/// ```no_run
/// use soundscope::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Corpus location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Connection settings for the remote vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIndexConfig {
    /// Base URL; queries go to `{endpoint}/query`.
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_MS
}

impl RemoteIndexConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            namespace: None,
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }

    /// Request timeout; a zero setting falls back to the default.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            0 => Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the corpus database
    pub db_path: PathBuf,
    /// Remote index; `None` keeps similarity purely local
    #[serde(default)]
    pub remote_index: Option<RemoteIndexConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: get_db_path().unwrap_or_else(|_| PathBuf::from(DB_FILE)),
            remote_index: None,
        }
    }
}

impl RuntimeConfig {
    /// Load `config.json` from the data directory, or defaults if absent.
    pub fn load() -> Result<Self> {
        let path = get_data_dir()?.join(CONFIG_FILE);
        if path.exists() {
            Self::from_file(&path)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::new()
        }
    }

    /// Create a new runtime configuration pointing at the default database
    pub fn new() -> Result<Self> {
        Ok(Self {
            db_path: get_db_path()?,
            remote_index: None,
        })
    }

    /// Create configuration with explicit database path
    #[must_use]
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            remote_index: None,
        }
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Apply command-line/environment overrides on top of the file.
    #[must_use]
    pub fn with_overrides(
        mut self,
        db_path: Option<PathBuf>,
        index_url: Option<String>,
        index_api_key: Option<String>,
    ) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        if let Some(url) = index_url {
            let mut remote = self
                .remote_index
                .take()
                .unwrap_or_else(|| RemoteIndexConfig::new(url.clone()));
            remote.endpoint = url;
            self.remote_index = Some(remote);
        }
        if let (Some(key), Some(remote)) = (index_api_key, self.remote_index.as_mut()) {
            remote.api_key = Some(key);
        }
        self
    }
}

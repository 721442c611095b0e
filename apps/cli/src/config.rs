//! CLI configuration management.
//!
//! A single JSON file, `<config dir>/artifactdrop/config.json`. Missing
//! fields take their defaults; an unreadable file is logged and replaced by
//! defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use artifactdrop_release_api::DEFAULT_BASE_URL;
use artifactdrop_upload::PollPolicy;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "artifactdrop";

fn default_max_attempts() -> u32 {
    PollPolicy::default().max_attempts
}

fn default_interval_secs() -> u64 {
    PollPolicy::default().interval.as_secs()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Release Management API token.
    #[serde(default)]
    pub api_token: String,

    /// Workspace slug used by `apps`.
    #[serde(default)]
    pub workspace_id: String,

    /// App used by `upload` when `--app` is omitted.
    #[serde(default)]
    pub last_app_id: String,

    /// Empty means the public service.
    #[serde(default)]
    pub api_base_url: String,

    #[serde(default = "default_max_attempts")]
    pub poll_max_attempts: u32,

    #[serde(default = "default_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            workspace_id: String::new(),
            last_app_id: String::new(),
            api_base_url: String::new(),
            poll_max_attempts: default_max_attempts(),
            poll_interval_secs: default_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Loads from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        let url = self.api_base_url.trim();
        if url.is_empty() { DEFAULT_BASE_URL } else { url }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            self.poll_max_attempts,
            Duration::from_secs(self.poll_interval_secs),
        )
    }
}

/// Per-user configuration directory for this app.
pub fn app_dir() -> anyhow::Result<PathBuf> {
    config_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| anyhow::anyhow!("cannot determine config directory"))
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(app_dir()?.join("config.json"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

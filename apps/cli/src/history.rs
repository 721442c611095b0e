//! Local upload history, newest first.

use std::path::{Path, PathBuf};

use artifactdrop_protocol::ArtifactKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_ENTRIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    pub sha256: String,
    pub artifact_id: String,
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_install_url: Option<String>,
}

pub struct UploadHistory {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl UploadHistory {
    /// Loads the history file; missing or unreadable files start empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse history");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        Self { path, entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds `entry` at the front and persists.
    pub fn record(&mut self, entry: HistoryEntry) -> anyhow::Result<()> {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_ENTRIES);
        self.save()
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

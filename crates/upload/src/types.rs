//! Data types for the upload flow.

use std::fmt;

use artifactdrop_protocol::{Platform, ProgressSnapshot, UploadOutcome};
use artifactdrop_transfer::ArtifactFile;

/// Lifecycle of one orchestrator.
///
/// `Ready` is idle with a hashed file selected. A cancelled attempt goes
/// back to `Ready` so the same file can be sent again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Idle,
    Hashing,
    Ready,
    Uploading,
    Succeeded,
    Failed,
    HashFailed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Hashing => "hashing",
            UploadState::Ready => "ready",
            UploadState::Uploading => "uploading",
            UploadState::Succeeded => "succeeded",
            UploadState::Failed => "failed",
            UploadState::HashFailed => "hash failed",
        }
    }

    /// States only left through `reset_upload`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Succeeded | UploadState::Failed | UploadState::HashFailed
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated and hashed file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub artifact: ArtifactFile,
    pub platform: Platform,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
}

/// Result of `start_upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    Completed(UploadOutcome),
    /// The caller stopped the transfer; no outcome is recorded.
    Cancelled,
}

impl UploadResult {
    pub fn outcome(&self) -> Option<&UploadOutcome> {
        match self {
            UploadResult::Completed(outcome) => Some(outcome),
            UploadResult::Cancelled => None,
        }
    }
}

/// Event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    StateChanged(UploadState),
    Progress(ProgressSnapshot),
    Finished(UploadResult),
}

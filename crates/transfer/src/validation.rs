use std::path::{Path, PathBuf};

use artifactdrop_protocol::{ArtifactKind, Platform};

use crate::TransferError;

/// A validated package file, ready to hash and upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub kind: ArtifactKind,
}

/// Validates a package file before any network activity.
///
/// Rejects:
/// - Paths without a file name
/// - Extensions other than `.ipa`, `.apk`, `.aab`
/// - Missing files and directories
/// - Empty files
/// - A package kind that cannot install on `declared` (when given)
pub fn validate_artifact_file(
    path: &Path,
    declared: Option<Platform>,
) -> Result<ArtifactFile, TransferError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::InvalidArtifact("No file selected".into()))?;

    let kind = ArtifactKind::from_file_name(&file_name).map_err(|_| {
        TransferError::InvalidArtifact(
            "Invalid file type. Please select an IPA, APK, or AAB file.".into(),
        )
    })?;

    let meta = std::fs::metadata(path).map_err(|_| {
        TransferError::InvalidArtifact(format!("File not found: {}", path.display()))
    })?;
    if !meta.is_file() {
        return Err(TransferError::InvalidArtifact(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(TransferError::InvalidArtifact(format!(
            "File is empty: {file_name}"
        )));
    }

    if let Some(platform) = declared
        && kind.platform() != platform
    {
        return Err(TransferError::InvalidArtifact(format!(
            "A .{} file cannot be uploaded to an {platform} app",
            kind.extension()
        )));
    }

    Ok(ArtifactFile {
        path: path.to_path_buf(),
        file_name,
        size: meta.len(),
        kind,
    })
}

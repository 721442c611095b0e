//! Local side of an artifact upload: hashing, validation, progress
//! accounting and the streamed PUT to a pre-signed transfer target.

mod body;
mod checksum;
mod engine;
mod progress;
mod validation;

pub use body::progress_body;
pub use checksum::{calculate_file_checksum, checksum_bytes, hash_file};
pub use engine::{TransferEngine, TransferOutcome};
pub use progress::{ProgressCallback, ProgressMeter};
pub use validation::{ArtifactFile, validate_artifact_file};

/// Default read size for the streamed request body: 256 KiB.
///
/// Each chunk handed to the HTTP client produces one progress snapshot.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    InvalidArtifact(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("task join error: {0}")]
    Join(String),
}

//! Upload orchestration errors.
//!
//! These are caller contract violations. Remote failures never appear
//! here; they end up in [`artifactdrop_protocol::UploadOutcome::message`].

use crate::types::UploadState;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: UploadState,
    },

    #[error("Failed to hash file: {0}")]
    Hashing(#[source] artifactdrop_transfer::TransferError),
}

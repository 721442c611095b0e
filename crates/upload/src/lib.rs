//! Artifact upload flow: resolve, transfer, poll, publish.
//!
//! This crate holds the business logic of one upload attempt. It has no
//! UI and talks to the outside world only through the [`ReleaseApi`] and
//! [`ArtifactTransport`] traits, implemented by the release-management
//! client and the transfer engine.
//!
//! # Pipeline
//!
//! 1. **Select**: validate the package and hash it
//! 2. **Resolve**: request a pre-signed transfer target
//! 3. **Transfer**: stream the bytes, reporting progress
//! 4. **Poll**: wait for processing to reach a terminal status
//! 5. **Publish**: enable the public install page and resolve its URL

pub mod activator;
pub mod api;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod types;

#[cfg(test)]
mod testing;

pub use activator::publish_install_page;
pub use api::{ApiFuture, ArtifactTransport, FileHasher, ReleaseApi, Sha256Hasher};
pub use error::UploadError;
pub use orchestrator::{CancelHandle, UploadOrchestrator};
pub use poller::{INVALID_ARTIFACT_MESSAGE, PollOutcome, PollPolicy, poll_status};
pub use types::{SelectedFile, UploadEvent, UploadResult, UploadState};

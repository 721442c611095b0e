//! Seams between the orchestrator and the outside world.
//!
//! `ReleaseApi`, `ArtifactTransport` and `FileHasher` are implemented by
//! the real client, engine and SHA-256 hasher; tests swap in mocks.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use artifactdrop_protocol::{
    ArtifactStatusReport, InstallableArtifact, PublicInstallPage, TransferTarget,
};
use artifactdrop_release_api::{ApiError, ApiToken, Client};
use artifactdrop_transfer::{
    ArtifactFile, ProgressCallback, TransferEngine, TransferError, TransferOutcome, hash_file,
};
use tokio_util::sync::CancellationToken;

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Release-management calls used during an upload.
pub trait ReleaseApi: Send + Sync {
    fn resolve_upload_target<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
        file_name: &'a str,
        file_size: u64,
    ) -> ApiFuture<'a, TransferTarget>;

    fn artifact_status<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
    ) -> ApiFuture<'a, ArtifactStatusReport>;

    fn enable_public_install_page<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
    ) -> ApiFuture<'a, PublicInstallPage>;

    fn list_installable_artifacts<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
    ) -> ApiFuture<'a, Vec<InstallableArtifact>>;

    fn submit_what_to_test<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
        notes: &'a str,
    ) -> ApiFuture<'a, ()>;
}

impl ReleaseApi for Client {
    fn resolve_upload_target<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
        file_name: &'a str,
        file_size: u64,
    ) -> ApiFuture<'a, TransferTarget> {
        Box::pin(Client::resolve_upload_target(
            self,
            token,
            app_id,
            artifact_id,
            file_name,
            file_size,
        ))
    }

    fn artifact_status<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
    ) -> ApiFuture<'a, ArtifactStatusReport> {
        Box::pin(Client::artifact_status(self, token, app_id, artifact_id))
    }

    fn enable_public_install_page<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
    ) -> ApiFuture<'a, PublicInstallPage> {
        Box::pin(Client::enable_public_install_page(
            self,
            token,
            app_id,
            artifact_id,
        ))
    }

    fn list_installable_artifacts<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
    ) -> ApiFuture<'a, Vec<InstallableArtifact>> {
        Box::pin(Client::list_installable_artifacts(self, token, app_id))
    }

    fn submit_what_to_test<'a>(
        &'a self,
        token: &'a ApiToken,
        app_id: &'a str,
        artifact_id: &'a str,
        notes: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(Client::submit_what_to_test(
            self,
            token,
            app_id,
            artifact_id,
            notes,
        ))
    }
}

/// Moves the artifact bytes to a resolved target.
pub trait ArtifactTransport: Send + Sync {
    fn transfer<'a>(
        &'a self,
        target: &'a TransferTarget,
        artifact: &'a ArtifactFile,
        on_progress: ProgressCallback,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = TransferOutcome> + Send + 'a>>;
}

impl ArtifactTransport for TransferEngine {
    fn transfer<'a>(
        &'a self,
        target: &'a TransferTarget,
        artifact: &'a ArtifactFile,
        on_progress: ProgressCallback,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = TransferOutcome> + Send + 'a>> {
        Box::pin(TransferEngine::transfer(
            self,
            target,
            artifact,
            on_progress,
            cancel,
        ))
    }
}

/// Computes the checksum recorded for a selected file.
pub trait FileHasher: Send + Sync {
    fn hash<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>>;
}

/// Hex SHA-256 of the whole file, computed on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl FileHasher for Sha256Hasher {
    fn hash<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>> {
        Box::pin(hash_file(path.to_path_buf()))
    }
}

//! Recording mocks for the `ReleaseApi`, `ArtifactTransport` and
//! `FileHasher` seams.

use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;

use artifactdrop_protocol::{
    ArtifactStatusReport, InstallableArtifact, Platform, ProgressSnapshot, PublicInstallPage,
    TransferTarget,
};
use artifactdrop_release_api::{ApiError, ApiToken};
use artifactdrop_transfer::{ArtifactFile, ProgressCallback, TransferError, TransferOutcome};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiFuture, ArtifactTransport, FileHasher, ReleaseApi};
use crate::orchestrator::CancelHandle;

pub(crate) fn report(status: &str, url: Option<&str>) -> ArtifactStatusReport {
    ArtifactStatusReport {
        status: status.into(),
        public_install_page_url: url.map(Into::into),
    }
}

pub(crate) fn target() -> TransferTarget {
    TransferTarget {
        url: "https://storage.example/obj".into(),
        method: "PUT".into(),
        headers: Vec::new(),
    }
}

/// Scripted API. Empty queues fall back to: a target, `processing`, an
/// empty page, an empty listing, and a successful notes call.
#[derive(Default)]
pub(crate) struct MockApi {
    pub resolve: Mutex<VecDeque<Result<TransferTarget, ApiError>>>,
    pub statuses: Mutex<VecDeque<Result<ArtifactStatusReport, ApiError>>>,
    pub activation: Mutex<VecDeque<Result<PublicInstallPage, ApiError>>>,
    pub listing: Mutex<VecDeque<Result<Vec<InstallableArtifact>, ApiError>>>,
    pub notes_result: Mutex<VecDeque<Result<(), ApiError>>>,
    /// When set and `listing` is empty, the listing holds one Android entry
    /// for the most recently queried artifact, carrying this URL.
    pub listed_url: Mutex<Option<String>>,
    pub calls: Mutex<Vec<String>>,
    pub notes: Mutex<Vec<String>>,
    last_artifact: Mutex<Option<String>>,
}

impl MockApi {
    pub fn with_statuses(statuses: Vec<Result<ArtifactStatusReport, ApiError>>) -> Self {
        let api = Self::default();
        *api.statuses.lock().unwrap() = statuses.into();
        api
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

impl ReleaseApi for MockApi {
    fn resolve_upload_target<'a>(
        &'a self,
        _token: &'a ApiToken,
        _app_id: &'a str,
        _artifact_id: &'a str,
        _file_name: &'a str,
        _file_size: u64,
    ) -> ApiFuture<'a, TransferTarget> {
        Box::pin(async move {
            self.record("resolve");
            self.resolve
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(target()))
        })
    }

    fn artifact_status<'a>(
        &'a self,
        _token: &'a ApiToken,
        _app_id: &'a str,
        artifact_id: &'a str,
    ) -> ApiFuture<'a, ArtifactStatusReport> {
        Box::pin(async move {
            self.record("status");
            *self.last_artifact.lock().unwrap() = Some(artifact_id.to_string());
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(report("processing", None)))
        })
    }

    fn enable_public_install_page<'a>(
        &'a self,
        _token: &'a ApiToken,
        _app_id: &'a str,
        _artifact_id: &'a str,
    ) -> ApiFuture<'a, PublicInstallPage> {
        Box::pin(async move {
            self.record("activate");
            self.activation
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PublicInstallPage::default()))
        })
    }

    fn list_installable_artifacts<'a>(
        &'a self,
        _token: &'a ApiToken,
        _app_id: &'a str,
    ) -> ApiFuture<'a, Vec<InstallableArtifact>> {
        Box::pin(async move {
            self.record("list");
            if let Some(scripted) = self.listing.lock().unwrap().pop_front() {
                return scripted;
            }
            let listed_url = self.listed_url.lock().unwrap().clone();
            let last = self.last_artifact.lock().unwrap().clone();
            Ok(match (listed_url, last) {
                (Some(url), Some(id)) => vec![InstallableArtifact {
                    id,
                    platform: Platform::Android,
                    file_name: None,
                    public_install_page_url: Some(url),
                }],
                _ => Vec::new(),
            })
        })
    }

    fn submit_what_to_test<'a>(
        &'a self,
        _token: &'a ApiToken,
        _app_id: &'a str,
        _artifact_id: &'a str,
        notes: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.record("notes");
            self.notes.lock().unwrap().push(notes.to_string());
            self.notes_result
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        })
    }
}

/// Transport that replays snapshots, then returns a scripted outcome or
/// parks until cancelled.
pub(crate) struct MockTransport {
    pub snapshots: Vec<ProgressSnapshot>,
    pub outcome: Mutex<Option<TransferOutcome>>,
    /// Number of upcoming calls that park until cancelled.
    pub park: Mutex<usize>,
    pub started: Notify,
    pub calls: Mutex<usize>,
}

impl MockTransport {
    pub fn completing() -> Self {
        Self::with_outcome(TransferOutcome::Completed { status: 200 })
    }

    pub fn with_outcome(outcome: TransferOutcome) -> Self {
        Self {
            snapshots: Vec::new(),
            outcome: Mutex::new(Some(outcome)),
            park: Mutex::new(0),
            started: Notify::new(),
            calls: Mutex::new(0),
        }
    }

    /// Parks on the first call, completes afterwards.
    pub fn parked() -> Self {
        Self {
            park: Mutex::new(1),
            ..Self::completing()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl ArtifactTransport for MockTransport {
    fn transfer<'a>(
        &'a self,
        _target: &'a TransferTarget,
        _artifact: &'a ArtifactFile,
        on_progress: ProgressCallback,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = TransferOutcome> + Send + 'a>> {
        Box::pin(async move {
            *self.calls.lock().unwrap() += 1;
            for snap in &self.snapshots {
                on_progress(*snap);
            }
            self.started.notify_one();
            let park = {
                let mut remaining = self.park.lock().unwrap();
                let park = *remaining > 0;
                *remaining = remaining.saturating_sub(1);
                park
            };
            if park {
                cancel.cancelled().await;
                return TransferOutcome::Cancelled;
            }
            if cancel.is_cancelled() {
                return TransferOutcome::Cancelled;
            }
            self.outcome
                .lock()
                .unwrap()
                .take()
                .unwrap_or(TransferOutcome::Completed { status: 200 })
        })
    }
}

/// Transport that requests cancellation through a [`CancelHandle`] and then
/// reports a completed transfer, as when a cancel arrives too late.
#[derive(Default)]
pub(crate) struct LateCancelTransport {
    pub handle: Mutex<Option<CancelHandle>>,
    /// What `cancel()` returned.
    pub accepted: Mutex<Option<bool>>,
}

impl ArtifactTransport for LateCancelTransport {
    fn transfer<'a>(
        &'a self,
        _target: &'a TransferTarget,
        _artifact: &'a ArtifactFile,
        _on_progress: ProgressCallback,
        _cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = TransferOutcome> + Send + 'a>> {
        Box::pin(async move {
            let accepted = self.handle.lock().unwrap().as_ref().map(CancelHandle::cancel);
            *self.accepted.lock().unwrap() = accepted;
            TransferOutcome::Completed { status: 200 }
        })
    }
}

/// Hasher that always fails to read the file.
pub(crate) struct FailingHasher;

impl FileHasher for FailingHasher {
    fn hash<'a>(
        &'a self,
        _path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'a>> {
        Box::pin(async {
            Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )))
        })
    }
}

//! Upload orchestrator.
//!
//! Owns the per-session state machine and drives one attempt through
//! resolve, transfer, status polling and install page publication.
//!
//! Cancellation reaches the target resolution and the byte transfer only.
//! Once the transfer has completed the token is disarmed, and polling runs
//! until a terminal status or until the poll budget is exhausted.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use artifactdrop_protocol::{ArtifactStatus, Platform, ProgressSnapshot, UploadOutcome};
use artifactdrop_release_api::ApiToken;
use artifactdrop_transfer::{ProgressCallback, TransferOutcome, validate_artifact_file};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::activator::publish_install_page;
use crate::api::{ArtifactTransport, FileHasher, ReleaseApi, Sha256Hasher};
use crate::error::UploadError;
use crate::poller::{PollOutcome, PollPolicy, poll_status};
use crate::types::{SelectedFile, UploadEvent, UploadResult, UploadState};

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct SessionInner {
    state: UploadState,
    file: Option<SelectedFile>,
    artifact_id: Option<String>,
    progress: Option<ProgressSnapshot>,
    status: Option<ArtifactStatus>,
    outcome: Option<UploadOutcome>,
    error: Option<String>,
    /// Armed only while the attempt can still be cancelled.
    cancel: Option<CancellationToken>,
}

type Session = Arc<RwLock<SessionInner>>;

fn read(session: &Session) -> RwLockReadGuard<'_, SessionInner> {
    session.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(session: &Session) -> RwLockWriteGuard<'_, SessionInner> {
    session.write().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle that stops an in-flight transfer.
#[derive(Clone)]
pub struct CancelHandle {
    session: Session,
}

impl CancelHandle {
    /// Returns `true` if a cancellable attempt was signalled.
    pub fn cancel(&self) -> bool {
        let s = read(&self.session);
        match (&s.state, &s.cancel) {
            (UploadState::Uploading, Some(token)) => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Drives single-file uploads, one at a time.
pub struct UploadOrchestrator {
    api: Arc<dyn ReleaseApi>,
    transport: Arc<dyn ArtifactTransport>,
    hasher: Arc<dyn FileHasher>,
    policy: PollPolicy,
    session: Session,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
}

impl UploadOrchestrator {
    pub fn new(api: Arc<dyn ReleaseApi>, transport: Arc<dyn ArtifactTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            api,
            transport,
            hasher: Arc::new(Sha256Hasher),
            policy: PollPolicy::default(),
            session: Arc::new(RwLock::new(SessionInner::default())),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the SHA-256 hasher used by [`select_file`](Self::select_file).
    pub fn with_hasher(mut self, hasher: Arc<dyn FileHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            session: Arc::clone(&self.session),
        }
    }

    pub fn state(&self) -> UploadState {
        read(&self.session).state
    }

    pub fn selected_file(&self) -> Option<SelectedFile> {
        read(&self.session).file.clone()
    }

    pub fn artifact_id(&self) -> Option<String> {
        read(&self.session).artifact_id.clone()
    }

    pub fn progress(&self) -> Option<ProgressSnapshot> {
        read(&self.session).progress
    }

    pub fn artifact_status(&self) -> Option<ArtifactStatus> {
        read(&self.session).status
    }

    pub fn last_outcome(&self) -> Option<UploadOutcome> {
        read(&self.session).outcome.clone()
    }

    /// Hashing error message while in `HashFailed`.
    pub fn last_error(&self) -> Option<String> {
        read(&self.session).error.clone()
    }

    /// Validates and hashes a package file: `Idle -> Hashing -> Ready`.
    ///
    /// Allowed from `Idle` and `Ready` (replacing the selection). Validation
    /// errors leave the state untouched; a hashing error moves to
    /// `HashFailed`.
    pub async fn select_file(
        &self,
        path: impl AsRef<Path>,
        platform: Platform,
    ) -> Result<SelectedFile, UploadError> {
        let artifact = validate_artifact_file(path.as_ref(), Some(platform))
            .map_err(|e| UploadError::Validation(e.to_string()))?;

        {
            let mut s = write(&self.session);
            if !matches!(s.state, UploadState::Idle | UploadState::Ready) {
                return Err(UploadError::InvalidState {
                    action: "select a file",
                    state: s.state,
                });
            }
            s.file = None;
            s.error = None;
            s.state = UploadState::Hashing;
        }
        self.emit(UploadEvent::StateChanged(UploadState::Hashing));

        match self.hasher.hash(&artifact.path).await {
            Ok(sha256) => {
                debug!(file = %artifact.file_name, sha256 = %sha256, "file hashed");
                let selected = SelectedFile {
                    artifact,
                    platform,
                    sha256,
                };
                self.transition(UploadState::Ready, |s| s.file = Some(selected.clone()));
                Ok(selected)
            }
            Err(e) => {
                error!(file = %artifact.file_name, error = %e, "hashing failed");
                let message = e.to_string();
                self.transition(UploadState::HashFailed, |s| s.error = Some(message));
                Err(UploadError::Hashing(e))
            }
        }
    }

    /// Runs one upload attempt for the selected file.
    ///
    /// Remote failures come back as `Completed` with `success == false`.
    /// `Err` is returned only for calls made in the wrong state or with
    /// missing identifiers, before any network activity.
    pub async fn start_upload(
        &self,
        token: &ApiToken,
        app_id: &str,
        release_notes: Option<&str>,
    ) -> Result<UploadResult, UploadError> {
        if token.is_empty() {
            return Err(UploadError::Validation("API token is required".into()));
        }
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(UploadError::Validation("App ID is required".into()));
        }

        let (file, artifact_id, cancel) = {
            let mut s = write(&self.session);
            if s.state != UploadState::Ready {
                return Err(UploadError::InvalidState {
                    action: "start an upload",
                    state: s.state,
                });
            }
            let Some(file) = s.file.clone() else {
                return Err(UploadError::Validation("No file selected".into()));
            };
            let artifact_id = Uuid::new_v4().to_string();
            let cancel = CancellationToken::new();
            s.state = UploadState::Uploading;
            s.artifact_id = Some(artifact_id.clone());
            s.progress = None;
            s.status = None;
            s.outcome = None;
            s.cancel = Some(cancel.clone());
            (file, artifact_id, cancel)
        };
        self.emit(UploadEvent::StateChanged(UploadState::Uploading));

        info!(
            artifact_id = %artifact_id,
            app_id,
            file = %file.artifact.file_name,
            size = file.artifact.size,
            "upload started"
        );

        let result = self
            .run(token, app_id, &file, &artifact_id, &cancel, release_notes)
            .await;

        match &result {
            UploadResult::Cancelled => {
                info!(artifact_id = %artifact_id, "upload cancelled");
                self.transition(UploadState::Ready, |s| {
                    s.cancel = None;
                    s.artifact_id = None;
                    s.progress = None;
                });
            }
            UploadResult::Completed(outcome) => {
                let next = if outcome.success {
                    info!(artifact_id = %artifact_id, url = ?outcome.public_install_url, "upload succeeded");
                    UploadState::Succeeded
                } else {
                    error!(artifact_id = %artifact_id, message = %outcome.message, "upload failed");
                    UploadState::Failed
                };
                self.transition(next, |s| {
                    s.cancel = None;
                    s.status = outcome.status;
                    s.outcome = Some(outcome.clone());
                });
            }
        }
        self.emit(UploadEvent::Finished(result.clone()));
        Ok(result)
    }

    /// Discards the finished attempt and the selected file.
    pub fn reset_upload(&self) -> Result<(), UploadError> {
        {
            let mut s = write(&self.session);
            if !s.state.is_terminal() {
                return Err(UploadError::InvalidState {
                    action: "reset",
                    state: s.state,
                });
            }
            *s = SessionInner::default();
        }
        self.emit(UploadEvent::StateChanged(UploadState::Idle));
        Ok(())
    }

    async fn run(
        &self,
        token: &ApiToken,
        app_id: &str,
        file: &SelectedFile,
        artifact_id: &str,
        cancel: &CancellationToken,
        release_notes: Option<&str>,
    ) -> UploadResult {
        let artifact = &file.artifact;

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return UploadResult::Cancelled,
            r = self.api.resolve_upload_target(
                token,
                app_id,
                artifact_id,
                &artifact.file_name,
                artifact.size,
            ) => r,
        };
        let target = match resolved {
            Ok(target) => target,
            Err(e) => {
                warn!(artifact_id, error = %e, "could not resolve upload target");
                return UploadResult::Completed(UploadOutcome::failed(artifact_id, e.to_string()));
            }
        };

        match self
            .transport
            .transfer(&target, artifact, self.progress_callback(), cancel)
            .await
        {
            TransferOutcome::Completed { status } => {
                debug!(artifact_id, status, "transfer completed");
            }
            TransferOutcome::Cancelled => return UploadResult::Cancelled,
            TransferOutcome::Failed { message, .. } => {
                return UploadResult::Completed(UploadOutcome::failed(artifact_id, message));
            }
        }

        {
            // `cancel()` holds the lock too: it either lands before this check or finds no token.
            let mut s = write(&self.session);
            s.cancel = None;
            if cancel.is_cancelled() {
                debug!(artifact_id, "cancelled after transfer completed");
                return UploadResult::Cancelled;
            }
        }

        let polled = poll_status(self.api.as_ref(), token, app_id, artifact_id, &self.policy).await;
        debug!(artifact_id, attempts = polled.attempts(), "polling finished");

        let outcome = match polled {
            PollOutcome::Valid {
                public_install_url, ..
            } => {
                if let Some(notes) = release_notes.map(str::trim).filter(|n| !n.is_empty()) {
                    self.spawn_release_notes(token.clone(), app_id, artifact_id, notes);
                }
                let url = publish_install_page(
                    self.api.as_ref(),
                    token,
                    app_id,
                    artifact_id,
                    file.platform,
                    public_install_url,
                )
                .await;
                UploadOutcome::succeeded(artifact_id, ArtifactStatus::ProcessedValid, url)
            }
            other => {
                let message = other.failure_message().unwrap_or_default();
                let mut outcome = UploadOutcome::failed(artifact_id, message);
                if matches!(other, PollOutcome::Invalid { .. }) {
                    outcome.status = Some(ArtifactStatus::ProcessedInvalid);
                }
                outcome
            }
        };
        UploadResult::Completed(outcome)
    }

    /// Submits release notes on a detached task; failures are only logged.
    fn spawn_release_notes(&self, token: ApiToken, app_id: &str, artifact_id: &str, notes: &str) {
        let api = Arc::clone(&self.api);
        let app_id = app_id.to_string();
        let artifact_id = artifact_id.to_string();
        let notes = notes.to_string();
        tokio::spawn(async move {
            match api
                .submit_what_to_test(&token, &app_id, &artifact_id, &notes)
                .await
            {
                Ok(()) => info!(artifact_id = %artifact_id, "release notes submitted"),
                Err(e) => {
                    warn!(artifact_id = %artifact_id, error = %e, "failed to submit release notes")
                }
            }
        });
    }

    fn progress_callback(&self) -> ProgressCallback {
        let session = Arc::clone(&self.session);
        let events = self.events_tx.clone();
        Box::new(move |snapshot| {
            write(&session).progress = Some(snapshot);
            let _ = events.try_send(UploadEvent::Progress(snapshot));
        })
    }

    fn transition(&self, to: UploadState, update: impl FnOnce(&mut SessionInner)) {
        {
            let mut s = write(&self.session);
            update(&mut s);
            s.state = to;
        }
        self.emit(UploadEvent::StateChanged(to));
    }

    fn emit(&self, event: UploadEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!(error = %e, "upload event dropped");
        }
    }
}

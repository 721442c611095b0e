//! Streamed byte transfer to a pre-signed target.

use std::time::Duration;

use artifactdrop_protocol::{ApiExchange, ExchangeLogger, TransferTarget, curl_command};
use reqwest::Method;
use reqwest::header::CONTENT_LENGTH;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::body::progress_body;
use crate::progress::ProgressCallback;
use crate::validation::ArtifactFile;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Time allowed to connect to the transfer target.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Longest silence tolerated on the connection. There is no total limit,
/// so large packages on slow links are not cut off.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// How a transfer ended.
///
/// Cancellation is its own variant so callers never have to inspect
/// messages to tell a user stop from a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The target answered with a 2xx status.
    Completed { status: u16 },
    /// Non-2xx answer, connection failure, or unusable target.
    Failed { status: Option<u16>, message: String },
    /// The cancellation token fired before the target answered.
    Cancelled,
}

/// Performs the single PUT (or whatever method the target names) of an
/// artifact to its transfer target.
pub struct TransferEngine {
    http: reqwest::Client,
    chunk_size: usize,
    logger: Option<ExchangeLogger>,
}

impl TransferEngine {
    /// Creates an engine with the default connect and read timeouts.
    pub fn new() -> Result<Self, TransferError> {
        Self::with_timeouts(CONNECT_TIMEOUT, READ_TIMEOUT)
    }

    /// Creates an engine whose connection fails after `read` without data.
    pub fn with_timeouts(connect: Duration, read: Duration) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .build()?;
        Ok(Self::with_client(http))
    }

    /// Creates an engine on top of an existing HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            chunk_size: DEFAULT_CHUNK_SIZE,
            logger: None,
        }
    }

    /// Sets the body read size (one progress snapshot per chunk).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Routes a diagnostic record of every transfer to `logger`.
    pub fn with_logger(mut self, logger: ExchangeLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Streams `artifact` to `target`.
    ///
    /// Dropping the in-flight request on cancellation aborts the
    /// connection immediately.
    pub async fn transfer(
        &self,
        target: &TransferTarget,
        artifact: &ArtifactFile,
        on_progress: ProgressCallback,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        let header_pairs: Vec<(&str, &str)> = target
            .headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
            .collect();
        let mut exchange = ApiExchange::new(Some(format!(
            "{} --data-binary '@{}'",
            curl_command(&target.method, &target.url, &header_pairs, None),
            artifact.file_name
        )));
        exchange.line(format!(
            "Uploading {} ({} bytes)",
            artifact.file_name, artifact.size
        ));

        let outcome = self
            .run(target, artifact, on_progress, cancel, &mut exchange)
            .await;
        self.emit(exchange);
        outcome
    }

    async fn run(
        &self,
        target: &TransferTarget,
        artifact: &ArtifactFile,
        on_progress: ProgressCallback,
        cancel: &CancellationToken,
        exchange: &mut ApiExchange,
    ) -> TransferOutcome {
        if cancel.is_cancelled() {
            exchange.line("Transfer cancelled before start");
            return TransferOutcome::Cancelled;
        }

        let method = match Method::from_bytes(target.method.to_ascii_uppercase().as_bytes()) {
            Ok(m) => m,
            Err(_) => {
                let message = format!("Invalid transfer method: {}", target.method);
                exchange.line(message.clone());
                return TransferOutcome::Failed {
                    status: None,
                    message,
                };
            }
        };

        let file = match tokio::fs::File::open(&artifact.path).await {
            Ok(f) => f,
            Err(e) => {
                let message = format!("Failed to read {}: {e}", artifact.file_name);
                exchange.line(message.clone());
                return TransferOutcome::Failed {
                    status: None,
                    message,
                };
            }
        };

        let body = progress_body(file, artifact.size, self.chunk_size, on_progress);
        let mut request = self
            .http
            .request(method, &target.url)
            .body(reqwest::Body::wrap_stream(body));
        for header in &target.headers {
            request = request.header(header.name.as_str(), header.value.as_str());
        }
        let has_length = target
            .headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()));
        if !has_length {
            request = request.header(CONTENT_LENGTH, artifact.size);
        }

        debug!(file = %artifact.file_name, size = artifact.size, "starting transfer");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(file = %artifact.file_name, "transfer cancelled");
                exchange.line("Transfer cancelled by user");
                return TransferOutcome::Cancelled;
            }
            r = request.send() => r,
        };

        match response {
            Ok(resp) => {
                let status = resp.status();
                exchange.line(format!("Transfer response status: {}", status.as_u16()));
                if status.is_success() {
                    info!(file = %artifact.file_name, status = status.as_u16(), "transfer completed");
                    TransferOutcome::Completed {
                        status: status.as_u16(),
                    }
                } else {
                    let reason = status.canonical_reason().unwrap_or("Unknown status");
                    warn!(file = %artifact.file_name, status = status.as_u16(), "transfer rejected");
                    TransferOutcome::Failed {
                        status: Some(status.as_u16()),
                        message: format!("Upload failed: {reason}"),
                    }
                }
            }
            Err(e) if e.is_builder() => {
                exchange.line(format!("Invalid transfer target: {e}"));
                TransferOutcome::Failed {
                    status: None,
                    message: format!("Invalid transfer target: {e}"),
                }
            }
            Err(e) => {
                warn!(file = %artifact.file_name, error = %e, "transfer network error");
                exchange.line(format!("Network error: {e}"));
                TransferOutcome::Failed {
                    status: None,
                    message: "Network error during upload".into(),
                }
            }
        }
    }

    fn emit(&self, exchange: ApiExchange) {
        if let Some(logger) = &self.logger {
            logger(exchange);
        }
    }
}

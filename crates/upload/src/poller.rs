//! Bounded, fixed-interval polling of artifact processing status.

use std::time::Duration;

use artifactdrop_protocol::ArtifactStatus;
use artifactdrop_release_api::ApiToken;
use tracing::{debug, info, warn};

use crate::api::ReleaseApi;

/// Message for a `processed_invalid` verdict.
pub const INVALID_ARTIFACT_MESSAGE: &str = "Artifact was processed but is invalid";

/// How many status queries to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval: Duration::from_secs(2),
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

/// Terminal result of a polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// `processed_valid`; carries the URL from the status report, if any.
    Valid {
        public_install_url: Option<String>,
        attempts: u32,
    },
    /// `processed_invalid`.
    Invalid { attempts: u32 },
    /// Budget exhausted while still pending.
    TimedOut { attempts: u32 },
    /// Classified API error or an unrecognised status value.
    Failed { message: String, attempts: u32 },
}

impl PollOutcome {
    /// User-facing failure message; `None` for `Valid`.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            PollOutcome::Valid { .. } => None,
            PollOutcome::Invalid { .. } => Some(INVALID_ARTIFACT_MESSAGE.to_string()),
            PollOutcome::TimedOut { attempts } => Some(format!(
                "Artifact processing timed out after {attempts} attempts"
            )),
            PollOutcome::Failed { message, .. } => Some(message.clone()),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Valid { attempts, .. }
            | PollOutcome::Invalid { attempts }
            | PollOutcome::TimedOut { attempts }
            | PollOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Queries status until a terminal state or `policy.max_attempts` queries.
///
/// Waits `policy.interval` between queries, never after the last one.
/// Connection failures use up an attempt and are retried; classified HTTP
/// errors and unknown status values end the run.
pub async fn poll_status(
    api: &dyn ReleaseApi,
    token: &ApiToken,
    app_id: &str,
    artifact_id: &str,
    policy: &PollPolicy,
) -> PollOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    while attempt < max_attempts {
        attempt += 1;

        match api.artifact_status(token, app_id, artifact_id).await {
            Ok(report) => match report.status.parse::<ArtifactStatus>() {
                Ok(ArtifactStatus::ProcessedValid) => {
                    info!(artifact_id, attempt, "artifact processed");
                    return PollOutcome::Valid {
                        public_install_url: report.public_install_page_url,
                        attempts: attempt,
                    };
                }
                Ok(ArtifactStatus::ProcessedInvalid) => {
                    warn!(artifact_id, attempt, "artifact rejected by processing");
                    return PollOutcome::Invalid { attempts: attempt };
                }
                Ok(pending) => {
                    debug!(artifact_id, attempt, status = %pending, "artifact still processing");
                }
                Err(e) => {
                    warn!(artifact_id, attempt, status = %report.status, "unexpected artifact status");
                    return PollOutcome::Failed {
                        message: e.to_string(),
                        attempts: attempt,
                    };
                }
            },
            Err(e) if e.is_transient() => {
                warn!(artifact_id, attempt, error = %e, "status query failed, retrying");
            }
            Err(e) => {
                return PollOutcome::Failed {
                    message: e.to_string(),
                    attempts: attempt,
                };
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    warn!(artifact_id, attempts = attempt, "artifact processing timed out");
    PollOutcome::TimedOut { attempts: attempt }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifactdrop_release_api::ApiError;
    use tokio::time::Instant;

    use crate::testing::{MockApi, report};

    fn token() -> ApiToken {
        ApiToken::new("t")
    }

    /// Elapsed virtual time is `expected`, short of one more interval.
    fn assert_waited(start: Instant, expected: Duration, interval: Duration) {
        let elapsed = start.elapsed();
        assert!(elapsed >= expected, "waited {elapsed:?}, expected {expected:?}");
        assert!(elapsed < expected + interval, "waited {elapsed:?}, expected {expected:?}");
    }

    #[test]
    fn default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, 15);
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(PollPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_then_valid_waits_once() {
        let api = MockApi::with_statuses(vec![
            Ok(report("uploaded", None)),
            Ok(report("processed_valid", Some("https://i/x"))),
        ]);
        let start = Instant::now();

        let outcome = poll_status(&api, &token(), "app", "art", &PollPolicy::default()).await;

        assert_eq!(
            outcome,
            PollOutcome::Valid {
                public_install_url: Some("https://i/x".into()),
                attempts: 2,
            }
        );
        assert_eq!(api.count("status"), 2);
        assert_waited(start, Duration::from_secs(2), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn always_processing_times_out_after_budget() {
        let api = MockApi::default();
        let start = Instant::now();

        let outcome = poll_status(&api, &token(), "app", "art", &PollPolicy::default()).await;

        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 15 });
        assert_eq!(api.count("status"), 15);
        assert_waited(start, Duration::from_secs(28), Duration::from_secs(2));
        assert_eq!(
            outcome.failure_message().unwrap(),
            "Artifact processing timed out after 15 attempts"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_is_terminal() {
        let api = MockApi::with_statuses(vec![
            Ok(report("upload_requested", None)),
            Ok(report("processed_invalid", None)),
        ]);
        let outcome = poll_status(&api, &token(), "app", "art", &PollPolicy::default()).await;
        assert_eq!(outcome, PollOutcome::Invalid { attempts: 2 });
        assert_eq!(outcome.failure_message().unwrap(), INVALID_ARTIFACT_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_is_hard_error() {
        let api = MockApi::with_statuses(vec![Ok(report("quarantined", None))]);
        let outcome = poll_status(&api, &token(), "app", "art", &PollPolicy::default()).await;
        assert_eq!(
            outcome,
            PollOutcome::Failed {
                message: "Unexpected artifact status: quarantined".into(),
                attempts: 1,
            }
        );
        assert_eq!(api.count("status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_consume_attempts() {
        let api = MockApi::with_statuses(vec![
            Err(ApiError::Network {
                operation: "checking artifact status",
            }),
            Err(ApiError::Network {
                operation: "checking artifact status",
            }),
            Ok(report("processed_valid", None)),
        ]);
        let outcome = poll_status(&api, &token(), "app", "art", &PollPolicy::default()).await;
        assert_eq!(outcome.attempts(), 3);
        assert!(outcome.failure_message().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn classified_error_stops_immediately() {
        let api = MockApi::with_statuses(vec![Err(ApiError::Unauthorized)]);
        let start = Instant::now();
        let outcome = poll_status(&api, &token(), "app", "art", &PollPolicy::default()).await;
        assert_eq!(
            outcome.failure_message().unwrap(),
            "Invalid or expired API token"
        );
        assert_eq!(api.count("status"), 1);
        assert_waited(start, Duration::ZERO, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_ceiling() {
        let api = MockApi::default();
        let policy = PollPolicy::new(10, Duration::from_millis(500));
        let start = Instant::now();
        let outcome = poll_status(&api, &token(), "app", "art", &policy).await;
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 10 });
        assert_waited(start, Duration::from_millis(4500), Duration::from_millis(500));
    }
}

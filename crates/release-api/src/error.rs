//! Status-code error taxonomy.
//!
//! The `Display` text of every variant is the message shown to the user.

use serde::Deserialize;

/// Errors from the release-management client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid or expired API token")]
    Unauthorized,

    #[error("Permission denied: the API token cannot access this resource")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Release Management server error (HTTP {status}). Please try again later.")]
    Server { status: u16 },

    #[error("{message}")]
    Unknown { status: u16, message: String },

    #[error("Network error while {operation}")]
    Network { operation: &'static str },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response from Release Management: {0}")]
    Decode(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Returns `true` for connection-level failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extracts a server-supplied message from a JSON error body.
fn server_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
}

/// Maps a non-2xx response to an [`ApiError`].
///
/// `what` describes the failed request for fallback messages, e.g.
/// `"get upload URL"`.
pub(crate) fn classify(status: u16, body: &str, what: &str) -> ApiError {
    let message = server_message(body);
    match status {
        400 => ApiError::BadRequest(
            message.unwrap_or_else(|| format!("Invalid request: could not {what}")),
        ),
        401 => ApiError::Unauthorized,
        403 => ApiError::Forbidden,
        404 => ApiError::NotFound(
            message.unwrap_or_else(|| format!("Not found: could not {what}")),
        ),
        500..=599 => ApiError::Server { status },
        _ => ApiError::Unknown {
            status,
            message: message.unwrap_or_else(|| {
                let reason = reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown status");
                format!("Failed to {what}: {reason}")
            }),
        },
    }
}

//! Diagnostic record of one remote exchange.
//!
//! The record is reconstructable: it carries a curl command equivalent to
//! the request (credential redacted) plus the ordered trace lines collected
//! while the request ran.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replacement text for credential header values.
pub const REDACTED: &str = "[REDACTED]";

/// Callback receiving every [`ApiExchange`].
pub type ExchangeLogger = Arc<dyn Fn(ApiExchange) + Send + Sync>;

/// One remote call and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiExchange {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curl_command: Option<String>,
    #[serde(default)]
    pub lines: Vec<String>,
}

impl ApiExchange {
    pub fn new(curl_command: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            curl_command,
            lines: Vec::new(),
        }
    }

    /// Appends a trace line.
    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

/// Renders a curl command line for a request.
///
/// `Authorization` values are replaced with [`REDACTED`]; single quotes in
/// the body are shell-escaped.
pub fn curl_command(method: &str, url: &str, headers: &[(&str, &str)], body: Option<&str>) -> String {
    let mut command = format!("curl -X {method}");
    for (name, value) in headers {
        let value = if name.eq_ignore_ascii_case("authorization") {
            REDACTED
        } else {
            value
        };
        command.push_str(&format!(" -H '{name}: {value}'"));
    }
    command.push_str(&format!(" '{url}'"));
    if let Some(body) = body {
        command.push_str(&format!(" -d '{}'", body.replace('\'', "'\\''")));
    }
    command
}

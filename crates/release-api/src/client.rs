//! Release-management API client.
//!
//! Async HTTP client using `reqwest`; the token is sent verbatim in the
//! `Authorization` header. Every call produces one [`ApiExchange`].

use std::time::Duration;

use artifactdrop_protocol::{
    ApiExchange, ArtifactStatusReport, ConnectedApp, ExchangeLogger, InstallableArtifact,
    Organization, PublicInstallPage, TransferTarget, curl_command,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ApiError, classify};
use crate::types::{ApiToken, Page, PublicPageRequest, WhatToTestRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.bitrise.io";

/// Time allowed to establish a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time allowed for one whole API request, response body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const RM_PREFIX: &str = "/release-management/v1";
const PAGE_SIZE: &str = "50";

/// Unreserved characters stay literal in path segments.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn segment(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT).to_string()
}

/// One request as described to [`Client::send`].
struct Call {
    /// Infinitive phrase for messages, e.g. "get upload URL".
    what: &'static str,
    /// Gerund phrase for network errors, e.g. "getting upload URL".
    operation: &'static str,
    method: Method,
    url: Url,
    body: Option<String>,
}

/// Release-management API client.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    logger: Option<ExchangeLogger>,
}

impl Client {
    /// Creates a client pointed at the public service.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeouts(CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Creates a client whose requests give up after `request` in total.
    ///
    /// A timed-out request fails as [`ApiError::Network`].
    pub fn with_timeouts(connect: Duration, request: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(request)
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            logger: None,
        })
    }

    /// Overrides the service root (self-hosted proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Routes a diagnostic record of every request to `logger`.
    pub fn with_logger(mut self, logger: ExchangeLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, path);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))
    }

    fn artifact_path(app_id: &str, artifact_id: &str, suffix: &str) -> String {
        format!(
            "{RM_PREFIX}/connected-apps/{}/installable-artifacts/{}/{suffix}",
            segment(app_id),
            segment(artifact_id)
        )
    }

    /// Performs one authenticated request and returns the raw 2xx body.
    async fn send(&self, token: &ApiToken, call: Call) -> Result<String, ApiError> {
        let mut headers = vec![("Authorization", token.as_str())];
        if call.body.is_some() {
            headers.push(("Content-Type", "application/json"));
        }
        let mut exchange = ApiExchange::new(Some(curl_command(
            call.method.as_str(),
            call.url.as_str(),
            &headers,
            call.body.as_deref(),
        )));
        exchange.line(format!("Action: {}", call.what));

        let result = self.execute(token, &call, &mut exchange).await;
        if let Err(e) = &result {
            exchange.line(format!("Error: {e}"));
        }
        if let Some(logger) = &self.logger {
            logger(exchange);
        }
        result
    }

    async fn execute(
        &self,
        token: &ApiToken,
        call: &Call,
        exchange: &mut ApiExchange,
    ) -> Result<String, ApiError> {
        let mut request = self
            .http
            .request(call.method.clone(), call.url.clone())
            .header(AUTHORIZATION, token.as_str());
        if let Some(body) = &call.body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        debug!(method = %call.method, path = call.url.path(), "api request");

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                return ApiError::Http(e);
            }
            warn!(operation = call.operation, error = %e, "api network error");
            ApiError::Network {
                operation: call.operation,
            }
        })?;

        let status = response.status();
        exchange.line(format!("API response status: {}", status.as_u16()));

        let body = response.text().await.map_err(|e| {
            warn!(operation = call.operation, error = %e, "failed to read api response");
            ApiError::Network {
                operation: call.operation,
            }
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), what = call.what, "api request rejected");
            return Err(classify(status.as_u16(), &body, call.what));
        }
        Ok(body)
    }

    /// Requests a pre-authorized transfer target for one artifact.
    pub async fn resolve_upload_target(
        &self,
        token: &ApiToken,
        app_id: &str,
        artifact_id: &str,
        file_name: &str,
        file_size: u64,
    ) -> Result<TransferTarget, ApiError> {
        let size = file_size.to_string();
        let url = self.url(
            &Self::artifact_path(app_id, artifact_id, "upload-url"),
            &[("file_name", file_name), ("file_size_bytes", &size)],
        )?;
        let body = self
            .send(
                token,
                Call {
                    what: "get upload URL",
                    operation: "getting upload URL",
                    method: Method::GET,
                    url,
                    body: None,
                },
            )
            .await?;
        decode(&body)
    }

    /// Queries the processing state of an uploaded artifact.
    pub async fn artifact_status(
        &self,
        token: &ApiToken,
        app_id: &str,
        artifact_id: &str,
    ) -> Result<ArtifactStatusReport, ApiError> {
        let url = self.url(&Self::artifact_path(app_id, artifact_id, "status"), &[])?;
        let body = self
            .send(
                token,
                Call {
                    what: "check artifact status",
                    operation: "checking artifact status",
                    method: Method::GET,
                    url,
                    body: None,
                },
            )
            .await?;
        decode(&body)
    }

    /// Turns on the public install page. An empty 2xx body is accepted.
    pub async fn enable_public_install_page(
        &self,
        token: &ApiToken,
        app_id: &str,
        artifact_id: &str,
    ) -> Result<PublicInstallPage, ApiError> {
        let url = self.url(
            &Self::artifact_path(app_id, artifact_id, "public-install-page"),
            &[],
        )?;
        let payload = serde_json::to_string(&PublicPageRequest {
            with_public_page: true,
        })?;
        let body = self
            .send(
                token,
                Call {
                    what: "enable public install page",
                    operation: "enabling public install page",
                    method: Method::PATCH,
                    url,
                    body: Some(payload),
                },
            )
            .await?;
        if body.trim().is_empty() {
            return Ok(PublicInstallPage::default());
        }
        decode(&body)
    }

    /// Lists the first page of installable artifacts of an app.
    pub async fn list_installable_artifacts(
        &self,
        token: &ApiToken,
        app_id: &str,
    ) -> Result<Vec<InstallableArtifact>, ApiError> {
        let url = self.url(
            &format!(
                "{RM_PREFIX}/connected-apps/{}/installable-artifacts",
                segment(app_id)
            ),
            &[("items_per_page", PAGE_SIZE), ("page", "1")],
        )?;
        let body = self
            .send(
                token,
                Call {
                    what: "list installable artifacts",
                    operation: "listing installable artifacts",
                    method: Method::GET,
                    url,
                    body: None,
                },
            )
            .await?;
        Ok(decode::<Page<InstallableArtifact>>(&body)?.data)
    }

    /// Attaches release notes to an artifact.
    pub async fn submit_what_to_test(
        &self,
        token: &ApiToken,
        app_id: &str,
        artifact_id: &str,
        notes: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(
            &Self::artifact_path(app_id, artifact_id, "what-to-test"),
            &[],
        )?;
        let payload = serde_json::to_string(&WhatToTestRequest {
            what_to_test: notes,
        })?;
        self.send(
            token,
            Call {
                what: "submit release notes",
                operation: "submitting release notes",
                method: Method::PATCH,
                url,
                body: Some(payload),
            },
        )
        .await?;
        Ok(())
    }

    /// Fetches one connected app; doubles as a credential check.
    pub async fn get_connected_app(
        &self,
        token: &ApiToken,
        app_id: &str,
    ) -> Result<ConnectedApp, ApiError> {
        let url = self.url(
            &format!("{RM_PREFIX}/connected-apps/{}", segment(app_id)),
            &[],
        )?;
        let result = self
            .send(
                token,
                Call {
                    what: "connect to app",
                    operation: "connecting to app",
                    method: Method::GET,
                    url,
                    body: None,
                },
            )
            .await;
        match result {
            Ok(body) => decode(&body),
            Err(ApiError::NotFound(_)) => Err(ApiError::NotFound(
                "App not found or not connected to Release Management".into(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Lists organizations (workspaces) visible to the token.
    pub async fn list_organizations(&self, token: &ApiToken) -> Result<Vec<Organization>, ApiError> {
        let url = self.url("/v0.1/organizations", &[])?;
        let body = self
            .send(
                token,
                Call {
                    what: "list organizations",
                    operation: "listing organizations",
                    method: Method::GET,
                    url,
                    body: None,
                },
            )
            .await?;
        Ok(decode::<Page<Organization>>(&body)?.data)
    }

    /// Lists the first page of apps connected in a workspace.
    pub async fn list_connected_apps(
        &self,
        token: &ApiToken,
        workspace_id: &str,
    ) -> Result<Vec<ConnectedApp>, ApiError> {
        let url = self.url(
            &format!("{RM_PREFIX}/connected-apps"),
            &[
                ("workspace_slug", workspace_id),
                ("items_per_page", PAGE_SIZE),
                ("page", "1"),
            ],
        )?;
        let body = self
            .send(
                token,
                Call {
                    what: "list connected apps",
                    operation: "listing connected apps",
                    method: Method::GET,
                    url,
                    body: None,
                },
            )
            .await?;
        Ok(decode::<Page<ConnectedApp>>(&body)?.data)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    Ok(serde_json::from_str(body)?)
}

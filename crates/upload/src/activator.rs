//! Public install page activation and URL reconciliation.

use artifactdrop_protocol::Platform;
use artifactdrop_release_api::ApiToken;
use tracing::{debug, warn};

use crate::api::ReleaseApi;

/// Enables the public install page and works out its URL.
///
/// URL precedence: matching entry (same id and platform) in the artifact
/// listing, then the URL returned by activation, then `report_url` from the
/// final status report. Activation and listing failures are logged and
/// never fail the upload; they only narrow the fallbacks.
pub async fn publish_install_page(
    api: &dyn ReleaseApi,
    token: &ApiToken,
    app_id: &str,
    artifact_id: &str,
    platform: Platform,
    report_url: Option<String>,
) -> Option<String> {
    let page = match api
        .enable_public_install_page(token, app_id, artifact_id)
        .await
    {
        Ok(page) => page,
        Err(e) => {
            warn!(artifact_id, error = %e, "could not enable public install page");
            return report_url;
        }
    };

    let activated_url = page.public_install_page_url.or(report_url);

    match api.list_installable_artifacts(token, app_id).await {
        Ok(artifacts) => {
            let listed = artifacts
                .into_iter()
                .find(|a| a.id == artifact_id && a.platform == platform)
                .and_then(|a| a.public_install_page_url);
            if listed.is_some() {
                debug!(artifact_id, "install page URL resolved from listing");
            }
            listed.or(activated_url)
        }
        Err(e) => {
            warn!(artifact_id, error = %e, "could not list installable artifacts");
            activated_url
        }
    }
}

use crate::core::error::OracleError;
use std::time::Duration;
use tracing::debug;

/// Upper bound for a single upstream request, connect to last byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: usize = 10;

/// Fetches `url` and returns the body as text
///
/// # Parameters
/// - `provider`: Name reported in the error when the request fails
/// - `url`: Absolute URL to GET
///
/// # Returns
/// The response body, or `UpstreamUnavailable` on timeout, connection
/// failure or a non-success status
pub async fn fetch_text(provider: &'static str, url: &str) -> Result<String, OracleError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("kurz/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| OracleError::upstream(provider, format!("Client error: {e}")))?;

    debug!("Requesting {} data from {}", provider, url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| OracleError::upstream(provider, format!("Request error: {e} URL: {url}")))?;

    if !response.status().is_success() {
        return Err(OracleError::upstream(
            provider,
            format!("HTTP error: {} URL: {}", response.status(), url),
        ));
    }

    response
        .text()
        .await
        .map_err(|e| OracleError::upstream(provider, format!("Failed to read body: {e}")))
}

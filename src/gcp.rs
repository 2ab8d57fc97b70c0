use crate::error::AuthError;
use serde::Deserialize;
use std::time::Duration;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Shared HTTP client for the GCP REST collaborators.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Fetch an access token: `GOOGLE_ACCESS_TOKEN` wins (local runs, tests),
/// otherwise ask the metadata server.
pub async fn fetch_access_token(client: &reqwest::Client) -> Result<String, AuthError> {
    if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }

    let response = client
        .get(METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await?
        .error_for_status()?;

    let token: TokenResponse = response.json().await?;
    Ok(token.access_token)
}

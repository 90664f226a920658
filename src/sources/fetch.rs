//! Credential fetch
//!
//! One outbound GET per call against the configured credential endpoint.
//! Nothing here touches the token store or persistence.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error};

use crate::config::sources::{AppCredentials, EndpointConfig};
use crate::error::TokenError;
use crate::parser::response::{parse_credential_response, FetchedCredential};

pub trait FetchToken: Send + Sync + 'static {
    fn fetch(
        &self,
        credentials: &AppCredentials,
    ) -> impl std::future::Future<Output = Result<FetchedCredential, TokenError>> + Send;
}

/// `now + lifetime - margin`, saturating at the i64 bounds. A lifetime shorter
/// than the margin yields a token that is already stale.
pub fn compute_expires_at(now: i64, lifetime_seconds: i64, safety_margin_seconds: u64) -> i64 {
    let margin = i64::try_from(safety_margin_seconds).unwrap_or(i64::MAX);
    now.saturating_add(lifetime_seconds).saturating_sub(margin)
}

#[derive(Debug, Clone)]
pub struct HttpTokenFetcher {
    client: Client,
    endpoint: EndpointConfig,
}

impl HttpTokenFetcher {
    pub fn new(endpoint: EndpointConfig) -> Result<Self, TokenError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(endpoint.timeout_ms))
            .build()?;
        Ok(Self { client, endpoint })
    }
}

impl FetchToken for HttpTokenFetcher {
    async fn fetch(&self, credentials: &AppCredentials) -> Result<FetchedCredential, TokenError> {
        let endpoint = &self.endpoint;
        let query = [
            (endpoint.params.grant_type.as_str(), endpoint.grant_type.as_str()),
            (endpoint.params.app_id.as_str(), credentials.app_id.as_str()),
            (endpoint.params.app_secret.as_str(), credentials.app_secret.as_str()),
        ];

        // the query string carries the secret, log the bare URL only
        debug!("requesting access token from {}", endpoint.url);
        let response = self.client.get(&endpoint.url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            error!("credential endpoint answered HTTP {}", status);
            return Err(TokenError::Transport(format!("HTTP request failed: {}", status)));
        }

        let body = response.text().await?;
        parse_credential_response(&body, &endpoint.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::compute_expires_at;

    #[test]
    fn expiry_subtracts_margin() {
        assert_eq!(compute_expires_at(1_000, 7200, 300), 7_900);
    }

    #[test]
    fn huge_lifetime_saturates_below_true_expiry() {
        let expires_at = compute_expires_at(1_000, i64::MAX, 300);
        assert_eq!(expires_at, i64::MAX - 300);
        assert!(expires_at < i64::MAX);
        assert_eq!(compute_expires_at(i64::MIN, -1, u64::MAX), i64::MIN);
    }

    #[test]
    fn tiny_lifetime_is_not_clamped() {
        assert_eq!(compute_expires_at(1_000, 60, 300), 760);
    }
}

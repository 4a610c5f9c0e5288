//! Okotoki REST lookups.
//!
//! Read-only reference data: the coins the service tracks and the markets of
//! each coin. No authentication, no retry, no caching.

use std::time::Duration;

use crate::domain::market::Market;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST errors.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Request could not be sent or the response not read.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },

    /// Response body is not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Client for the Okotoki REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// Create a client for `base_url` (e.g. `https://api-eu.okotoki.com`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RestError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RestError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// List the coins the service tracks.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or a
    /// malformed body.
    pub async fn supported_coins(&self) -> Result<Vec<String>, RestError> {
        self.get_json(&format!("{}/coins", self.base_url)).await
    }

    /// List the markets of a coin. The coin is uppercased in the path.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or a
    /// malformed body.
    pub async fn markets_for_coin(&self, coin: &str) -> Result<Vec<Market>, RestError> {
        self.get_json(&format!("{}/markets/{}", self.base_url, coin.to_uppercase()))
            .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RestError> {
        tracing::debug!(url, "Okotoki REST request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| RestError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = RestClient::new("https://api-eu.okotoki.com/").unwrap();
        assert_eq!(client.base_url, "https://api-eu.okotoki.com");
    }
}

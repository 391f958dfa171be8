use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::envelope::unwrap_envelope;
use super::query::Query;
use crate::config::ExplorerConfig;
use crate::error::FetchError;

/// Anything that can answer explorer queries with a raw `result` payload.
#[async_trait]
pub trait ExplorerSource: Send + Sync {
    async fn fetch(&self, query: &Query) -> Result<Value, FetchError>;
}

/// HTTP client for an Etherscan-compatible explorer API.
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExplorerClient {
    pub fn new(config: &ExplorerConfig, api_key: &str) -> eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("QuaiScan-Dashboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| eyre::eyre!("Failed to build explorer HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: api_key.to_string(),
        })
    }

    async fn fetch_body(&self, query: &Query) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&query.params())
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::UpstreamUnavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamError(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::UpstreamUnavailable(e.without_url().to_string()))?;

        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        unwrap_envelope(body)
    }
}

#[async_trait]
impl ExplorerSource for ExplorerClient {
    async fn fetch(&self, query: &Query) -> Result<Value, FetchError> {
        let result = self.fetch_body(query).await;
        match &result {
            Ok(_) => tracing::debug!(
                module = query.module(),
                action = query.action(),
                "Explorer query succeeded"
            ),
            Err(e) => tracing::warn!(
                module = query.module(),
                action = query.action(),
                kind = e.kind(),
                error = %e,
                "Explorer query failed"
            ),
        }
        result
    }
}

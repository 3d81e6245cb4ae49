//! Tavily search API client.

use super::{SearchHit, SearchProvider};
use crate::config::SearchConfig;
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Client for Tavily's `/search` endpoint.
pub struct TavilySearch {
    client: Client,
    base_url: String,
    api_key: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    /// Create a client reading the API key from `config.api_key_env`.
    pub fn new(config: &SearchConfig) -> Result<Self, ConfigError> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| ConfigError::EnvVarMissing {
                var: config.api_key_env.clone(),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a client with an explicitly provided API key.
    pub fn new_with_key(config: &SearchConfig, api_key: String) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("deepresearch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            max_results: config.max_results,
        })
    }

    fn request_body(&self, query: &str) -> serde_json::Value {
        serde_json::json!({
            "query": query,
            "max_results": self.max_results,
            "search_depth": "basic",
        })
    }

    fn parse_results(body: &str) -> Result<Vec<SearchHit>, SearchError> {
        let parsed: TavilyResponse =
            serde_json::from_str(body).map_err(|e| SearchError::ResponseParse {
                message: e.to_string(),
            })?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchHit::new(r.content, r.url))
            .collect())
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        debug!(query, max_results = self.max_results, "Sending Tavily search");
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| SearchError::Request {
            message: format!("Failed to read response body: {}", e.without_url()),
        })?;
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_results(&body)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

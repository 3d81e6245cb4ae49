//! Web-search collaborator.
//!
//! The research stage sends each planned query through a `SearchProvider`
//! and turns every non-empty hit into a raw note tagged with its URL.

pub mod tavily;

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use tavily::TavilySearch;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    /// Source URL. Empty when the provider returned none.
    #[serde(default)]
    pub url: String,
}

impl SearchHit {
    pub fn new(content: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
        }
    }
}

/// Trait for web-search providers.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query and return its hits in ranking order.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;

    /// Provider name used in logs.
    fn name(&self) -> &str;
}

/// A scripted search provider for tests and offline runs.
///
/// Queries with a scripted failure return an error; every other query returns
/// its scripted hits, or the default hits when none were scripted.
#[derive(Default)]
pub struct MockSearchProvider {
    default_hits: Vec<SearchHit>,
    scripted: HashMap<String, Vec<SearchHit>>,
    failures: HashMap<String, String>,
    queries: std::sync::Mutex<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these hits for any query without a script.
    pub fn with_default_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.default_hits = hits;
        self
    }

    /// Return these hits for one specific query.
    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.scripted.insert(query.to_string(), hits);
        self
    }

    /// Fail one specific query.
    pub fn with_failure(mut self, query: &str, message: &str) -> Self {
        self.failures.insert(query.to_string(), message.to_string());
        self
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());

        if let Some(message) = self.failures.get(query) {
            return Err(SearchError::Request {
                message: message.clone(),
            });
        }
        Ok(self
            .scripted
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default_hits.clone()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

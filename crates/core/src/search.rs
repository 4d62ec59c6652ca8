//! SearchClient trait: the abstraction over the web-search backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,

    /// Relevance score, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// A bounded, ranked list of results for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// A web search backend (Tavily in production, stubs in tests).
#[async_trait]
pub trait SearchClient: Send + Sync {
    fn name(&self) -> &str;

    /// Run `query`, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResponse, SearchError>;
}

//! Tavily search client.
//!
//! `POST {base_url}/search` with `{api_key, query, max_results}`; the
//! response's `results` array is mapped onto [`SearchResult`]s.

use async_trait::async_trait;
use deepdive_core::error::SearchError;
use deepdive_core::search::{SearchClient, SearchResponse, SearchResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

pub struct TavilyClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, TAVILY_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn parse_body(query: &str, body: &str) -> Result<SearchResponse, SearchError> {
        let parsed: ApiSearchResponse =
            serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(SearchResponse {
            query: query.to_string(),
            results: parsed
                .results
                .into_iter()
                .map(|r| SearchResult {
                    title: r.title,
                    url: r.url,
                    snippet: r.content,
                    score: r.score,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResponse, SearchError> {
        let url = format!("{}/search", self.base_url);
        let request = ApiSearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
        };

        debug!(query, max_results, "Sending search request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        if status != 200 {
            warn!(status, body = %body, "Search API returned error");
            return Err(SearchError::Api {
                status,
                message: body,
            });
        }

        let mut parsed = Self::parse_body(query, &body)?;
        parsed.results.truncate(max_results);
        Ok(parsed)
    }
}

// --- Tavily API types (internal) ---

#[derive(Serialize)]
struct ApiSearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    results: Vec<ApiSearchResult>,
}

#[derive(Debug, Deserialize)]
struct ApiSearchResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

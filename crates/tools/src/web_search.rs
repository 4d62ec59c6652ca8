//! The `search` leaf tool.
//!
//! Wraps a [`SearchClient`] and reports each query to the progress log.
//! Backend failures come back as [`ToolError::SearchUnavailable`], which the
//! registry turns into a `search error: ...` result.

use std::sync::Arc;

use async_trait::async_trait;
use deepdive_core::error::ToolError;
use deepdive_core::event::{NullSink, ProgressSink};
use deepdive_core::search::SearchClient;
use deepdive_core::tool::Tool;

/// Upper bound on results per query, whatever the model asks for.
pub const MAX_RESULTS_CAP: usize = 20;

const SOURCE: &str = "Search Tool";

pub struct WebSearchTool {
    client: Arc<dyn SearchClient>,
    default_max_results: usize,
    progress: Arc<dyn ProgressSink>,
}

impl WebSearchTool {
    pub fn new(client: Arc<dyn SearchClient>) -> Self {
        Self {
            client,
            default_max_results: 5,
            progress: Arc::new(NullSink),
        }
    }

    pub fn with_default_max_results(mut self, max_results: usize) -> Self {
        self.default_max_results = max_results.clamp(1, MAX_RESULTS_CAP);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for factual information. Returns ranked results with titles, URLs, and content snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": format!("Number of results to return (default {}, at most {MAX_RESULTS_CAP})", self.default_max_results)
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"].as_str().unwrap_or_default();
        let max_results = arguments["max_results"]
            .as_u64()
            .map(|n| (n as usize).clamp(1, MAX_RESULTS_CAP))
            .unwrap_or(self.default_max_results);

        self.progress.emit(SOURCE, "executing_query", query.to_string());

        match self.client.search(query, max_results).await {
            Ok(response) => {
                self.progress.emit(
                    SOURCE,
                    "found_results",
                    format!("{} results", response.results.len()),
                );
                serde_json::to_string_pretty(&response)
                    .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
            }
            Err(e) => {
                self.progress.emit(SOURCE, "error", e.to_string());
                Err(ToolError::SearchUnavailable(e.to_string()))
            }
        }
    }
}

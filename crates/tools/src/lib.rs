//! Leaf tool implementations for DeepDive.
//!
//! The research agents have one leaf tool, `search`, backed by the Tavily
//! web search API.

pub mod tavily;
pub mod web_search;

pub use tavily::TavilyClient;
pub use web_search::WebSearchTool;

use std::sync::Arc;

use deepdive_config::AppConfig;
use deepdive_core::event::ProgressSink;

/// Build the `search` tool from configuration.
///
/// `api_key` is the Tavily key already resolved at startup.
pub fn search_tool(
    config: &AppConfig,
    api_key: &str,
    progress: Arc<dyn ProgressSink>,
) -> WebSearchTool {
    let client = TavilyClient::with_base_url(api_key, &config.search.api_url);
    WebSearchTool::new(Arc::new(client))
        .with_default_max_results(config.search.max_results)
        .with_progress(progress)
}

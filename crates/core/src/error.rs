//! Error types for the DeepDive domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::time::Duration;

use thiserror::Error;

use crate::message::Transcript;

// --- Bounded context errors ---

/// Failures of the Model Client.
///
/// Every variant means the model was unavailable for this turn; the loop
/// reports them as [`LoopError::ModelUnavailable`].
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures raised while resolving, validating or executing a tool.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// Failures while assembling an agent's tool set.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("duplicate tool '{0}' in tool set")]
    DuplicateTool(String),
}

/// Failures of the Search Client.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("search API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse search response: {0}")]
    Parse(String),
}

/// Terminal failures of one execution loop invocation.
///
/// These are not contained by the loop that raised them. When the loop runs
/// as a nested agent tool, the parent's dispatch converts them to a string.
#[derive(Debug, Clone, Error)]
pub enum LoopError {
    #[error("agent '{agent}' exceeded its budget of {max_turns} model turns")]
    BudgetExceeded {
        agent: String,
        max_turns: u32,
        /// The partial transcript at the point of abort.
        transcript: Box<Transcript>,
    },

    #[error("agent '{agent}' requires a tool call but the model answered directly")]
    NoToolCalled { agent: String },

    #[error("model unavailable for agent '{agent}': {source}")]
    ModelUnavailable {
        agent: String,
        #[source]
        source: ProviderError,
    },

    #[error("agent '{agent}' timed out after {}ms", timeout.as_millis())]
    TimedOut { agent: String, timeout: Duration },

    #[error("agent '{agent}' was cancelled")]
    Cancelled { agent: String },
}

impl LoopError {
    /// The partial transcript carried by an aborted run, if any.
    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            Self::BudgetExceeded { transcript, .. } => Some(transcript),
            _ => None,
        }
    }
}

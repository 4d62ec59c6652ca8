//! # DeepDive Core
//!
//! Domain types, traits, and error definitions for the DeepDive research
//! assistant. This crate defines the domain model that every other crate
//! implements against: messages and transcripts, the Model Client
//! ([`Provider`]) and [`SearchClient`] seams, tools and the [`ToolRegistry`],
//! agent definitions, and the progress log.
//!
//! Implementations live in their respective crates, which keeps the
//! execution loop testable against scripted providers and stub tools.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod search;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentDefinition, SamplingConfig, ToolChoice};
pub use error::{LoopError, ProviderError, RegistryError, SearchError, ToolError};
pub use event::{NullSink, ProgressEvent, ProgressLog, ProgressSink};
pub use message::{Message, MessageToolCall, Role, Transcript, TranscriptId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use search::{SearchClient, SearchResponse, SearchResult};
pub use tool::{AgentInvoker, AgentTool, Tool, ToolCall, ToolRef, ToolRegistry, ToolResult};

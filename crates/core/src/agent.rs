//! Agent definitions and sampling configuration.
//!
//! An [`AgentDefinition`] is the unit composed into hierarchies: a name,
//! instructions, a tool set and sampling parameters. It is immutable once
//! built and is shared behind an `Arc` by every run that uses it.

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::tool::{ToolRef, ToolRegistry};

/// Whether the model may, must, or must not call tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides (default)
    #[default]
    Auto,
    /// The model must call at least one tool on the first turn
    Required,
    /// The model must answer directly
    None,
}

impl std::str::FromStr for ToolChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "required" => Ok(Self::Required),
            "none" => Ok(Self::None),
            other => Err(format!("unknown tool_choice '{other}' (expected auto, required or none)")),
        }
    }
}

/// Sampling parameters passed to the Model Client on every turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Tool-calling policy
    #[serde(default)]
    pub tool_choice: ToolChoice,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

impl SamplingConfig {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            tool_choice: ToolChoice::Auto,
        }
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::new(default_temperature(), default_max_tokens())
    }
}

/// A named, immutable agent configuration.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    /// Agent name (shown in progress events and errors)
    pub name: String,

    /// Short description, used when the agent is exposed as a tool
    pub description: String,

    /// System instructions
    pub instructions: String,

    /// Sampling parameters
    pub sampling: SamplingConfig,

    /// Model override; the runner's default model applies when `None`
    pub model: Option<String>,

    /// Turn budget override; the runner's default applies when `None`
    pub max_turns: Option<u32>,

    tools: ToolRegistry,
}

impl AgentDefinition {
    /// Create an agent with no tools and default sampling.
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            sampling: SamplingConfig::default(),
            model: None,
            max_turns: None,
            tools: ToolRegistry::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Add a tool to this agent's tool set.
    ///
    /// Fails if a tool with the same name is already present.
    pub fn with_tool(mut self, tool: ToolRef) -> Result<Self, RegistryError> {
        self.tools.register(tool)?;
        Ok(self)
    }

    /// Add several tools, failing on the first duplicate name.
    pub fn with_tools(
        self,
        tools: impl IntoIterator<Item = ToolRef>,
    ) -> Result<Self, RegistryError> {
        tools.into_iter().try_fold(self, |agent, tool| agent.with_tool(tool))
    }

    /// The agent's tool set.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

//! Tools: the callables a model can invoke.
//!
//! A tool is either a *leaf* (a plain async function such as web search) or
//! an *agent tool* that runs a whole nested agent loop. Both are reached
//! through a [`ToolRegistry`], which resolves names, validates arguments
//! against the declared JSON Schema and contains every failure: invoking a
//! tool always yields a [`ToolResult`] string, never an error.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentDefinition;
use crate::error::{LoopError, RegistryError, ToolError};
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// A request to execute a tool, as emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Raw arguments string (JSON object)
    pub arguments: String,
}

impl From<&MessageToolCall> for ToolCall {
    fn from(tc: &MessageToolCall) -> Self {
        Self {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments: tc.arguments.clone(),
        }
    }
}

/// The result of one tool call. Always produced, success or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content, or an error description
    pub output: String,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            output: output.into(),
        }
    }

    /// A failed result whose output starts with the `"<tool> error:"` marker.
    pub fn error(call_id: impl Into<String>, tool_name: &str, error: impl std::fmt::Display) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            output: error_output(tool_name, error),
        }
    }
}

/// Format a contained failure the way the model sees it.
pub fn error_output(tool_name: &str, error: impl std::fmt::Display) -> String {
    format!("{tool_name} error: {error}")
}

/// Whether `output` is a contained failure of `tool_name`.
pub fn is_error_output(tool_name: &str, output: &str) -> bool {
    output
        .strip_prefix(tool_name)
        .is_some_and(|rest| rest.starts_with(" error:"))
}

/// A leaf tool: a plain async function with a declared input schema.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: Value) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An agent exposed to a parent loop as a single tool.
///
/// The tool takes one string argument; its value becomes the nested run's
/// user input and the nested run's final output becomes the tool result.
#[derive(Debug, Clone)]
pub struct AgentTool {
    name: String,
    description: String,
    argument: String,
    definition: Arc<AgentDefinition>,
}

impl AgentTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        argument: impl Into<String>,
        definition: Arc<AgentDefinition>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            argument: argument.into(),
            definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Name of the single string argument (e.g. "query").
    pub fn argument(&self) -> &str {
        &self.argument
    }

    pub fn definition(&self) -> &Arc<AgentDefinition> {
        &self.definition
    }

    pub fn parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            self.argument.clone(),
            serde_json::json!({
                "type": "string",
                "description": format!("Input for the {}", self.definition.name)
            }),
        );
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": [self.argument]
        })
    }

    /// Extract the nested run's input from validated arguments.
    pub fn input_from(&self, arguments: &Value) -> String {
        match &arguments[self.argument.as_str()] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Runs the nested loop behind an [`AgentTool`].
///
/// Implemented by the execution loop; the registry stays free of any
/// knowledge about how a run is driven.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke_agent(&self, tool: &AgentTool, input: String) -> Result<String, LoopError>;
}

/// A callable known to an agent: the closed set of tool kinds.
#[derive(Clone)]
pub enum ToolRef {
    Leaf(Arc<dyn Tool>),
    Agent(AgentTool),
}

impl ToolRef {
    /// Wrap a leaf tool.
    pub fn leaf(tool: impl Tool + 'static) -> Self {
        Self::Leaf(Arc::new(tool))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(tool) => tool.name(),
            Self::Agent(agent) => agent.name(),
        }
    }

    pub fn parameters_schema(&self) -> Value {
        match self {
            Self::Leaf(tool) => tool.parameters_schema(),
            Self::Agent(agent) => agent.parameters_schema(),
        }
    }

    pub fn to_definition(&self) -> ToolDefinition {
        match self {
            Self::Leaf(tool) => tool.to_definition(),
            Self::Agent(agent) => ToolDefinition {
                name: agent.name().to_string(),
                description: agent.description().to_string(),
                parameters: agent.parameters_schema(),
            },
        }
    }
}

impl std::fmt::Debug for ToolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf(tool) => f.debug_tuple("Leaf").field(&tool.name()).finish(),
            Self::Agent(agent) => f.debug_tuple("Agent").field(&agent.name()).finish(),
        }
    }
}

/// An agent's tool set, keyed by name.
///
/// The execution loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Resolve, validate and invoke tools when the LLM requests them
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolRef>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: ToolRef) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<&ToolRef, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(ToolRef::to_definition)
            .collect()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve a call and validate its arguments, with typed errors.
    pub fn prepare(&self, call: &ToolCall) -> Result<(&ToolRef, Value), ToolError> {
        let tool = self.resolve(&call.name)?;
        let arguments = parse_arguments(&call.name, &tool.parameters_schema(), &call.arguments)?;
        Ok((tool, arguments))
    }

    /// Invoke a call. Every failure (unknown tool, bad arguments, handler
    /// error, handler panic, nested loop failure) becomes an error result.
    pub async fn invoke(&self, call: &ToolCall, agents: &dyn AgentInvoker) -> ToolResult {
        let (tool, arguments) = match self.prepare(call) {
            Ok(prepared) => prepared,
            Err(e) => return ToolResult::error(&call.id, &call.name, e),
        };

        let outcome = match tool {
            ToolRef::Leaf(tool) => match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err("tool panicked".to_string()),
            },
            ToolRef::Agent(agent) => {
                let input = agent.input_from(&arguments);
                match AssertUnwindSafe(agents.invoke_agent(agent, input)).catch_unwind().await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("agent '{}' panicked", agent.definition().name)),
                }
            }
        };

        match outcome {
            Ok(output) => ToolResult::ok(&call.id, output),
            Err(reason) => ToolResult::error(&call.id, &call.name, reason),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.order.iter()).finish()
    }
}

/// Parse a raw arguments string and check it against a JSON Schema.
///
/// Only the subset of JSON Schema that tool declarations use is checked:
/// the top level must be an object, `required` properties must be present,
/// and declared primitive `type`s must match.
pub fn parse_arguments(tool_name: &str, schema: &Value, raw: &str) -> Result<Value, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason,
    };

    let arguments: Value = if raw.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(raw).map_err(|e| invalid(format!("not valid JSON: {e}")))?
    };

    let Some(object) = arguments.as_object() else {
        return Err(invalid("arguments must be a JSON object".into()));
    };

    if let Some(required) = schema["required"].as_array() {
        for field in required.iter().filter_map(Value::as_str) {
            if object.get(field).is_none_or(Value::is_null) {
                return Err(invalid(format!("missing required field '{field}'")));
            }
        }
    }

    if let Some(properties) = schema["properties"].as_object() {
        for (field, value) in object {
            let Some(expected) = properties.get(field).and_then(|p| p["type"].as_str()) else {
                continue;
            };
            if !json_type_matches(expected, value) {
                return Err(invalid(format!("field '{field}' must be of type {expected}")));
            }
        }
    }

    Ok(arguments)
}

fn json_type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

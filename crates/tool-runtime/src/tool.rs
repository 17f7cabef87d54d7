use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Describes a tool's interface for MCP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "cwac_scan")
    pub name: String,
    /// Human-readable description shown to the client
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Result content, a JSON document for every scan tool
    pub content: String,
    /// Whether this result represents an error
    pub is_error: bool,
}

impl ToolResult {
    /// Pretty-printed JSON success payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        Ok(Self {
            content: serde_json::to_string_pretty(value)?,
            is_error: false,
        })
    }

    /// Pretty-printed JSON error payload.
    pub fn error_payload(payload: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            content: serde_json::to_string_pretty(payload)?,
            is_error: true,
        })
    }

    /// Parse the content back as JSON.
    pub fn to_value(&self) -> Result<Value, ToolError> {
        Ok(serde_json::from_str(&self.content)?)
    }
}

/// Per-call context handed to every tool.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Identifier of the request that triggered the call, for log correlation
    pub request_id: String,
}

impl ToolContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given JSON input.
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Deserialize tool arguments, treating a missing or null input as `{}`.
pub fn parse_args<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    let input = if input.is_null() {
        Value::Object(Default::default())
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

//! Error types for the MCP crate.

use crate::types::{error_codes, JsonRpcError};

/// Errors raised while serving MCP requests.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Failed to parse JSON.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Well-formed JSON that is not a valid JSON-RPC request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport I/O error.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The requested method is not supported.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters for a method.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

impl McpError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            McpError::JsonParse(_) => error_codes::PARSE_ERROR,
            McpError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParams(_) | McpError::ToolNotFound(_) => error_codes::INVALID_PARAMS,
            McpError::Transport(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Convert to a JSON-RPC error object.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }
}

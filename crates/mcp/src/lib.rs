//! Model Context Protocol server for the accessibility scan tools.
//!
//! JSON-RPC 2.0, one message per line, served from a
//! [`a11y_tool_runtime::ToolRegistry`].
//!
//! # Architecture
//!
//! - **types**: JSON-RPC envelopes and MCP message shapes
//! - **transport**: line framing over stdio, plus an in-memory channel pair
//! - **server**: request dispatch (`initialize`, `ping`, `tools/list`, `tools/call`)
//! - **error**: protocol errors and their JSON-RPC codes
//!
//! # Usage
//! ```no_run
//! use a11y_mcp::{McpServer, StdioTransport};
//! use a11y_tool_runtime::ToolRegistry;
//!
//! # async fn example() {
//! let mut server = McpServer::new(ToolRegistry::new());
//! server.run(&mut StdioTransport::stdio()).await.unwrap();
//! # }
//! ```

pub mod error;
pub mod server;
pub mod transport;
pub mod types;

pub use error::McpError;
pub use server::McpServer;
pub use transport::{ChannelTransport, LineTransport, McpTransport, StdioTransport};
pub use types::*;

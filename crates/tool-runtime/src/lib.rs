//! Tool abstraction and the scan tools exposed over MCP.
//!
//! Each tool wraps one [`a11y_scan::ScanService`] operation: it parses the
//! JSON arguments, calls the service and returns the outcome as a JSON
//! payload. Service errors become error payloads rather than faults.

pub mod registry;
pub mod tool;
pub mod tools;

pub use registry::{RegistryError, ToolRegistry};
pub use tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
pub use tools::{
    scan_tool_registry, GenerateReportTool, GetResultsTool, GetSummaryTool, ListScansTool,
    ScanStatusTool, StartScanTool,
};

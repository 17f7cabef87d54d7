//! Scan tools, one per service operation.
//!
//! All tools share one [`ScanService`], so a job started by `cwac_scan` is
//! visible to every other tool.

pub mod report;
pub mod results;
pub mod scan;
pub mod status;

pub use report::GenerateReportTool;
pub use results::{GetResultsTool, GetSummaryTool};
pub use scan::StartScanTool;
pub use status::{ListScansTool, ScanStatusTool};

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use a11y_scan::{QueryError, ScanService};

use crate::registry::{RegistryError, ToolRegistry};
use crate::tool::{ToolError, ToolResult};

/// Registry holding every scan tool, bound to `service`.
pub fn scan_tool_registry(service: Arc<ScanService>) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(StartScanTool::new(service.clone()))?;
    registry.register(ScanStatusTool::new(service.clone()))?;
    registry.register(GetResultsTool::new(service.clone()))?;
    registry.register(GetSummaryTool::new(service.clone()))?;
    registry.register(ListScansTool::new(service.clone()))?;
    registry.register(GenerateReportTool::new(service))?;
    Ok(registry)
}

/// Turn a service outcome into a tool result. Service errors become error
/// payloads, never tool faults.
pub(crate) fn respond<T: Serialize>(
    tool: &str,
    outcome: Result<T, QueryError>,
) -> Result<ToolResult, ToolError> {
    match outcome {
        Ok(value) => ToolResult::json(&value),
        Err(e) => {
            debug!(tool = %tool, error = %e, "scan operation refused");
            ToolResult::error_payload(&e.to_payload())
        }
    }
}

/// JSON Schema for tools whose only argument is a scan ID.
pub(crate) fn scan_id_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "scan_id": {
                "type": "string",
                "description": "The unique identifier returned by cwac_scan"
            }
        },
        "required": ["scan_id"]
    })
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ScanIdArgs {
    pub scan_id: String,
}

//! `cwac_get_results` and `cwac_get_summary`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use a11y_scan::ScanService;

use crate::tool::{parse_args, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{respond, scan_id_schema, ScanIdArgs};

#[derive(Debug, Deserialize)]
struct GetResultsArgs {
    scan_id: String,
    #[serde(default)]
    audit_type: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Return individual finding rows from a completed scan.
pub struct GetResultsTool {
    service: Arc<ScanService>,
}

impl GetResultsTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetResultsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "cwac_get_results".to_string(),
            description: "Retrieve finding rows from a completed scan, optionally restricted to \
                          one audit type, filtered by impact level, and capped in count."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "scan_id": {
                        "type": "string",
                        "description": "The unique identifier returned by cwac_scan"
                    },
                    "audit_type": {
                        "type": "string",
                        "description": "Audit type to read, e.g. axe_core_audit or language_audit. All types when omitted"
                    },
                    "impact": {
                        "type": "string",
                        "description": "Impact level (critical, serious, moderate, minor), matched case-insensitively. Only applies to audit types with an impact column"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Maximum number of rows to return"
                    }
                },
                "required": ["scan_id"]
            }),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: GetResultsArgs = parse_args(input)?;
        debug!(
            request_id = %context.request_id,
            scan_id = %args.scan_id,
            audit_type = ?args.audit_type,
            impact = ?args.impact,
            limit = ?args.limit,
            "reading scan results"
        );

        let outcome = self
            .service
            .get_results(&args.scan_id, args.audit_type, args.impact, args.limit)
            .await;
        respond("cwac_get_results", outcome)
    }
}

/// Return aggregate counts for a completed scan.
pub struct GetSummaryTool {
    service: Arc<ScanService>,
}

impl GetSummaryTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetSummaryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "cwac_get_summary".to_string(),
            description: "Summarize a completed scan: total issues, counts per audit type, the \
                          axe-core impact breakdown and the most frequent violations."
                .to_string(),
            input_schema: scan_id_schema(),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: ScanIdArgs = parse_args(input)?;
        debug!(request_id = %context.request_id, scan_id = %args.scan_id, "summarizing scan");
        respond("cwac_get_summary", self.service.get_summary(&args.scan_id).await)
    }
}

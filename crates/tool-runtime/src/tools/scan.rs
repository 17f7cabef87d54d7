//! `cwac_scan`: launch a scan against one or more URLs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use a11y_scan::{ScanOptions, ScanService, Viewport};

use crate::tool::{parse_args, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::respond;

const DEFAULT_AUDIT_NAME: &str = "mcp_scan";

fn default_audit_name() -> String {
    DEFAULT_AUDIT_NAME.to_string()
}

#[derive(Debug, Deserialize)]
struct StartScanArgs {
    urls: Vec<String>,
    #[serde(default = "default_audit_name")]
    audit_name: String,
    #[serde(default)]
    plugins: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    max_links_per_domain: Option<u32>,
    #[serde(default)]
    viewport_sizes: Option<BTreeMap<String, Viewport>>,
}

impl StartScanArgs {
    fn options(&self) -> ScanOptions {
        ScanOptions {
            plugins: self.plugins.clone().unwrap_or_default(),
            max_links_per_domain: self.max_links_per_domain,
            viewport_sizes: self.viewport_sizes.clone(),
        }
    }
}

/// Start an asynchronous scan. Progress is polled with `cwac_scan_status`.
pub struct StartScanTool {
    service: Arc<ScanService>,
}

impl StartScanTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for StartScanTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "cwac_scan".to_string(),
            description: "Launch an accessibility scan against one or more URLs. The scan runs \
                          in the background; use cwac_scan_status to monitor progress and \
                          cwac_get_results or cwac_get_summary once it completes."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                        "description": "URLs to scan; each is crawled up to max_links_per_domain pages"
                    },
                    "audit_name": {
                        "type": "string",
                        "description": "Human-readable audit name, used to find the results directory",
                        "default": DEFAULT_AUDIT_NAME
                    },
                    "plugins": {
                        "type": "object",
                        "additionalProperties": {"type": "boolean"},
                        "description": "Audit plugin toggles, e.g. {\"language_audit\": false}. Ignored in axe-only mode"
                    },
                    "max_links_per_domain": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum pages to crawl per domain"
                    },
                    "viewport_sizes": {
                        "type": "object",
                        "additionalProperties": {
                            "type": "object",
                            "properties": {
                                "width": {"type": "integer"},
                                "height": {"type": "integer"}
                            },
                            "required": ["width", "height"]
                        },
                        "description": "Viewport overrides by name, e.g. {\"small\": {\"width\": 320, \"height\": 480}}"
                    }
                },
                "required": ["urls"]
            }),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: StartScanArgs = parse_args(input)?;
        info!(
            request_id = %context.request_id,
            audit_name = %args.audit_name,
            urls = args.urls.len(),
            "starting scan"
        );

        let outcome = self
            .service
            .start_scan(&args.urls, &args.audit_name, &args.options())
            .await;
        respond("cwac_scan", outcome)
    }
}

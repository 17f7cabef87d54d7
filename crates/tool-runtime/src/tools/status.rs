//! `cwac_scan_status` and `cwac_list_scans`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use a11y_scan::ScanService;

use crate::tool::{parse_args, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{respond, scan_id_schema, ScanIdArgs};

/// Report a job's state, timing and recent output.
pub struct ScanStatusTool {
    service: Arc<ScanService>,
}

impl ScanStatusTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for ScanStatusTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "cwac_scan_status".to_string(),
            description: "Check whether a scan is running, complete or failed. Includes elapsed \
                          time, the most recent output lines and, for failed scans, the last \
                          error output."
                .to_string(),
            input_schema: scan_id_schema(),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: ScanIdArgs = parse_args(input)?;
        debug!(request_id = %context.request_id, scan_id = %args.scan_id, "scan status");
        respond("cwac_scan_status", self.service.get_status(&args.scan_id).await)
    }
}

/// List tracked jobs and every results directory on disk.
pub struct ListScansTool {
    service: Arc<ScanService>,
}

impl ListScansTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for ListScansTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "cwac_list_scans".to_string(),
            description: "List scans tracked in this session together with every scan results \
                          directory found on disk, newest first."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        debug!(request_id = %context.request_id, "listing scans");
        respond("cwac_list_scans", self.service.list_jobs().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{call, fallback_service, wait_terminal};
    use a11y_scan::ScanOptions;

    #[tokio::test]
    async fn test_status_of_failed_scan_includes_error_output() {
        let root = tempfile::tempdir().unwrap();
        let service = fallback_service(root.path(), "echo progress; echo 'fatal: timeout' >&2; exit 2");
        let started = service
            .start_scan(&["https://a.example/".to_string()], "fails", &ScanOptions::default())
            .await
            .unwrap();
        wait_terminal(&service, &started.scan_id).await;

        let tool = ScanStatusTool::new(service);
        let (is_error, payload) = call(&tool, serde_json::json!({"scan_id": started.scan_id})).await;
        assert!(!is_error);
        assert_eq!(payload["status"], "failed");
        assert_eq!(payload["recent_output"], serde_json::json!(["progress"]));
        assert_eq!(payload["error_output"], serde_json::json!(["fatal: timeout"]));
        assert!(payload["end_time"].is_string());
        assert!(payload["elapsed_seconds"].is_number());
    }

    #[tokio::test]
    async fn test_status_of_running_scan() {
        let root = tempfile::tempdir().unwrap();
        let service = fallback_service(root.path(), "sleep 5");
        let started = service
            .start_scan(&["https://a.example/".to_string()], "slow", &ScanOptions::default())
            .await
            .unwrap();

        let tool = ScanStatusTool::new(service);
        let (is_error, payload) = call(&tool, serde_json::json!({"scan_id": started.scan_id})).await;
        assert!(!is_error);
        assert_eq!(payload["status"], "running");
        assert!(payload.get("end_time").is_none());
        assert!(payload.get("error_output").is_none());
    }

    #[tokio::test]
    async fn test_status_of_unknown_scan() {
        let root = tempfile::tempdir().unwrap();
        let tool = ScanStatusTool::new(fallback_service(root.path(), "true"));

        let (is_error, payload) = call(&tool, serde_json::json!({"scan_id": "nope"})).await;
        assert!(is_error);
        assert_eq!(payload["error"], "Scan 'nope' not found.");
    }

    #[tokio::test]
    async fn test_list_scans() {
        let root = tempfile::tempdir().unwrap();
        let service = fallback_service(root.path(), "true");
        let started = service
            .start_scan(&["https://a.example/".to_string()], "listed", &ScanOptions::default())
            .await
            .unwrap();
        wait_terminal(&service, &started.scan_id).await;

        let tool = ListScansTool::new(service);
        let (is_error, payload) = call(&tool, Value::Null).await;
        assert!(!is_error);
        assert_eq!(payload["scan_mode"], "axe-only");
        let active = payload["active_scans"].as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["scan_id"], started.scan_id.as_str());
        assert_eq!(active[0]["audit_name"], "listed");
        assert_eq!(active[0]["status"], "complete");
        assert_eq!(payload["result_directories"].as_array().unwrap().len(), 1);
    }
}

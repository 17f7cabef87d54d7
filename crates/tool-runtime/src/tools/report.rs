//! `cwac_generate_report`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use a11y_scan::ScanService;

use crate::tool::{parse_args, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{respond, scan_id_schema, ScanIdArgs};

/// Generate report files for a completed scan.
pub struct GenerateReportTool {
    service: Arc<ScanService>,
}

impl GenerateReportTool {
    pub fn new(service: Arc<ScanService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GenerateReportTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "cwac_generate_report".to_string(),
            description: "Generate a report for a completed scan. With the full engine this runs \
                          its report export; in axe-only mode a Markdown report is written into \
                          the results directory."
                .to_string(),
            input_schema: scan_id_schema(),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: ScanIdArgs = parse_args(input)?;
        info!(request_id = %context.request_id, scan_id = %args.scan_id, "generating report");
        respond(
            "cwac_generate_report",
            self.service.generate_report(&args.scan_id).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{call, fallback_service, wait_terminal, SCANNER};
    use a11y_scan::ScanOptions;

    #[tokio::test]
    async fn test_fallback_report_is_written() {
        let root = tempfile::tempdir().unwrap();
        let service = fallback_service(root.path(), SCANNER);
        let started = service
            .start_scan(&["https://a.example/".to_string()], "report me", &ScanOptions::default())
            .await
            .unwrap();
        wait_terminal(&service, &started.scan_id).await;

        let tool = GenerateReportTool::new(service);
        let (is_error, payload) = call(&tool, serde_json::json!({"scan_id": started.scan_id})).await;
        assert!(!is_error);
        let files = payload["report_files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        let path = std::path::PathBuf::from(files[0].as_str().unwrap());
        assert!(path.is_file());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("report_me_"));
    }

    #[tokio::test]
    async fn test_report_for_failed_scan_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let service = fallback_service(root.path(), "exit 1");
        let started = service
            .start_scan(&["https://a.example/".to_string()], "broken", &ScanOptions::default())
            .await
            .unwrap();
        wait_terminal(&service, &started.scan_id).await;

        let tool = GenerateReportTool::new(service);
        let (is_error, payload) = call(&tool, serde_json::json!({"scan_id": started.scan_id})).await;
        assert!(is_error);
        assert_eq!(payload["status"], "failed");
        assert!(payload["error"]
            .as_str()
            .unwrap()
            .contains("Cannot generate a report for a failed scan"));
    }
}

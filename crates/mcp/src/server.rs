//! MCP server over a [`ToolRegistry`].
//!
//! Reads one JSON-RPC message per line, dispatches requests and answers them
//! in order. Notifications never get a reply.

use serde::Serialize;
use serde_json::Value;

use a11y_tool_runtime::{ToolContext, ToolRegistry};

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::*;

/// MCP server exposing the scan tools.
pub struct McpServer {
    registry: ToolRegistry,
    server_name: String,
    server_version: String,
    instructions: Option<String>,
    initialized: bool,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            server_name: "cwac".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            initialized: false,
        }
    }

    /// Text handed to the client in the `initialize` result.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Serve until the transport closes.
    pub async fn run<T: McpTransport>(&mut self, transport: &mut T) -> Result<(), McpError> {
        tracing::info!(server = %self.server_name, tools = self.registry.len(), "MCP server starting");

        while let Some(line) = transport.receive().await? {
            tracing::debug!(message = %line, "Received message");

            if let Some(response) = self.handle_line(&line).await {
                let json = serde_json::to_string(&response)?;
                tracing::debug!(response = %json, "Sending response");
                transport.send(&json).await?;
            }
        }

        tracing::info!("Transport closed, shutting down");
        Ok(())
    }

    /// Handle one raw message. Returns `None` for notifications.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON");
                return Some(JsonRpcResponse::failure(
                    RpcId::Null,
                    McpError::JsonParse(e).to_rpc_error(),
                ));
            }
        };

        if raw.get("id").is_none() {
            match serde_json::from_value::<JsonRpcNotification>(raw) {
                Ok(notif) => self.handle_notification(&notif),
                Err(e) => tracing::debug!(error = %e, "Ignoring malformed notification"),
            }
            return None;
        }

        let id = raw
            .get("id")
            .and_then(|v| serde_json::from_value::<RpcId>(v.clone()).ok())
            .unwrap_or(RpcId::Null);
        match serde_json::from_value::<JsonRpcRequest>(raw) {
            Ok(request) => Some(self.handle_request(&request).await),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON-RPC request");
                Some(JsonRpcResponse::failure(
                    id,
                    McpError::InvalidRequest(e.to_string()).to_rpc_error(),
                ))
            }
        }
    }

    /// Handle a single JSON-RPC request and produce a response.
    pub async fn handle_request(&mut self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        let outcome = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(&id, &request.params).await,
            method => {
                tracing::warn!(method = %method, "Unknown method");
                Err(McpError::MethodNotFound(method.to_string()))
            }
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::failure(id, e.to_rpc_error()),
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                tracing::info!(initialized = self.initialized, "Client confirmed initialization");
            }
            "notifications/cancelled" => {
                tracing::debug!("Client cancelled a request");
            }
            method => {
                tracing::debug!(method = %method, "Unknown notification, ignoring");
            }
        }
    }

    fn handle_initialize(&mut self, params: &Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p.clone())
                .map_err(|e| McpError::InvalidParams(e.to_string()))?,
            None => InitializeParams::default(),
        };
        tracing::info!(
            client = params.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
            protocol = params.protocol_version.as_deref().unwrap_or(PROTOCOL_VERSION),
            "Handling initialize"
        );
        self.initialized = true;

        to_result(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: Some(self.server_version.clone()),
            },
            instructions: self.instructions.clone(),
        })
    }

    fn handle_list_tools(&self) -> Result<Value, McpError> {
        let tools: Vec<ToolInfo> = self.registry.list().into_iter().map(ToolInfo::from).collect();
        tracing::debug!(count = tools.len(), "Handling tools/list");
        to_result(ListToolsResult { tools })
    }

    async fn handle_call_tool(&self, id: &RpcId, params: &Option<Value>) -> Result<Value, McpError> {
        let params = params
            .as_ref()
            .ok_or_else(|| McpError::InvalidParams("missing params".to_string()))?;
        let call: CallToolParams = serde_json::from_value(params.clone())
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| McpError::ToolNotFound(call.name.clone()))?;

        tracing::debug!(tool = %call.name, request_id = %id, "Handling tools/call");
        let ctx = ToolContext::new(id.to_string());

        let result = match tool.execute(call.arguments, &ctx).await {
            Ok(tool_result) => CallToolResult::text(tool_result.content, tool_result.is_error),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                let payload = serde_json::json!({ "error": e.to_string() });
                CallToolResult::text(payload.to_string(), true)
            }
        };
        to_result(result)
    }
}

fn to_result<T: Serialize>(value: T) -> Result<Value, McpError> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use a11y_core::config::{PathsConfig, RuntimeConfig};
    use a11y_core::{Config, ScanMode};
    use a11y_scan::{EngineEnvironment, ScanService};
    use a11y_tool_runtime::scan_tool_registry;

    use crate::transport::ChannelTransport;

    const NOT_INSTALLED: &str = "Neither the engine nor the fallback scanner is installed.";

    fn test_server(root: &std::path::Path) -> McpServer {
        let config = Config {
            profile: String::new(),
            paths: PathsConfig {
                project_root: root.to_path_buf(),
                engine_dir: None,
                python: "sh".to_string(),
                fallback_scanner: PathBuf::from("scanner.sh"),
                axe_core_script: PathBuf::from("axe.min.js"),
            },
            runtime: RuntimeConfig::default(),
        };
        let env = EngineEnvironment::new(ScanMode::Unavailable, None, NOT_INSTALLED);
        let service = Arc::new(ScanService::new(config, env));
        McpServer::new(scan_tool_registry(service).unwrap()).with_instructions(NOT_INSTALLED)
    }

    fn call_request(id: i64, name: &str, arguments: Value) -> JsonRpcRequest {
        JsonRpcRequest::new(
            RpcId::Number(id),
            "tools/call",
            Some(serde_json::json!({"name": name, "arguments": arguments})),
        )
    }

    fn text_of(result: &CallToolResult) -> Value {
        match &result.content[0] {
            ToolContent::Text { text } => serde_json::from_str(text).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());
        let req = JsonRpcRequest::new(
            RpcId::Number(1),
            "initialize",
            Some(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test-client"}
            })),
        );

        let resp = server.handle_request(&req).await;
        assert!(resp.error.is_none());
        let result: InitializeResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
        assert_eq!(result.server_info.name, "cwac");
        assert_eq!(result.instructions.as_deref(), Some(NOT_INSTALLED));
    }

    #[tokio::test]
    async fn test_handle_list_tools() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());
        let req = JsonRpcRequest::new(RpcId::Number(2), "tools/list", None);

        let resp = server.handle_request(&req).await;
        let result: ListToolsResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        let names: Vec<&str> = result.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"cwac_scan"));
        assert!(names.contains(&"cwac_generate_report"));
        assert!(result.tools.iter().all(|t| t.input_schema["type"] == "object"));
    }

    #[tokio::test]
    async fn test_unknown_scan_is_error_payload() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());

        let resp = server
            .handle_request(&call_request(3, "cwac_scan_status", serde_json::json!({"scan_id": "missing"})))
            .await;
        assert!(resp.error.is_none());
        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(result.is_error);
        assert_eq!(text_of(&result)["error"], "Scan 'missing' not found.");
    }

    #[tokio::test]
    async fn test_scan_without_scanner_reports_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());

        let resp = server
            .handle_request(&call_request(4, "cwac_scan", serde_json::json!({"urls": ["https://a.example/"]})))
            .await;
        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(result.is_error);
        assert!(text_of(&result)["error"].as_str().unwrap().contains(NOT_INSTALLED));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_tool_errors() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());

        let resp = server
            .handle_request(&call_request(5, "cwac_get_summary", serde_json::json!({})))
            .await;
        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(result.is_error);
        assert!(text_of(&result)["error"].as_str().unwrap().contains("scan_id"));

        let resp = server
            .handle_request(&call_request(
                6,
                "cwac_get_results",
                serde_json::json!({"scan_id": "x", "limit": -1}),
            ))
            .await;
        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(result.is_error);
        let payload = text_of(&result);
        assert!(payload["error"].as_str().unwrap().starts_with("Invalid input"));
    }

    #[tokio::test]
    async fn test_handle_call_tool_not_found() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());

        let resp = server
            .handle_request(&call_request(6, "cwac_nonexistent", serde_json::json!({})))
            .await;
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_ping_and_unknown_method() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());

        let resp = server
            .handle_request(&JsonRpcRequest::new(RpcId::Number(7), "ping", None))
            .await;
        assert_eq!(resp.result.unwrap(), serde_json::json!({}));

        let resp = server
            .handle_request(&JsonRpcRequest::new(RpcId::Number(8), "resources/list", None))
            .await;
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handle_line_edge_cases() {
        let root = tempfile::tempdir().unwrap();
        let mut server = test_server(root.path());

        let resp = server.handle_line("{not json").await.unwrap();
        assert_eq!(resp.id, RpcId::Null);
        assert_eq!(resp.error.unwrap().code, error_codes::PARSE_ERROR);

        let resp = server.handle_line(r#"{"jsonrpc":"2.0","id":"abc"}"#).await.unwrap();
        assert_eq!(resp.id, RpcId::String("abc".to_string()));
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);

        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_server_run_with_channel_transport() {
        let root = tempfile::tempdir().unwrap();
        let (mut client_side, mut server_side) = ChannelTransport::pair();
        let mut server = test_server(root.path());

        let server_handle = tokio::spawn(async move { server.run(&mut server_side).await });

        let init_req = JsonRpcRequest::new(
            RpcId::Number(1),
            "initialize",
            Some(serde_json::json!({"protocolVersion": PROTOCOL_VERSION})),
        );
        client_side
            .send(&serde_json::to_string(&init_req).unwrap())
            .await
            .unwrap();
        let resp: JsonRpcResponse =
            serde_json::from_str(&client_side.receive().await.unwrap().unwrap()).unwrap();
        assert!(resp.error.is_none());

        client_side
            .send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .unwrap();

        let list_req = call_request(2, "cwac_list_scans", Value::Null);
        client_side
            .send(&serde_json::to_string(&list_req).unwrap())
            .await
            .unwrap();
        let resp: JsonRpcResponse =
            serde_json::from_str(&client_side.receive().await.unwrap().unwrap()).unwrap();
        assert_eq!(resp.id, RpcId::Number(2));
        let result: CallToolResult = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(!result.is_error);
        let listing = text_of(&result);
        assert_eq!(listing["scan_mode"], "unavailable");
        assert_eq!(listing["active_scans"], serde_json::json!([]));

        drop(client_side);
        server_handle.await.unwrap().unwrap();
    }
}

//! a11y-mcp: MCP server driving accessibility scans over stdio.
//!
//! Exposes `cwac_scan`, `cwac_scan_status`, `cwac_get_results`,
//! `cwac_get_summary`, `cwac_list_scans` and `cwac_generate_report`.
//! stdout carries the protocol, so all logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use a11y_core::config::{load_dotenv, Config};
use a11y_mcp::{McpServer, StdioTransport};
use a11y_scan::{check_environment, ScanService};
use a11y_tool_runtime::scan_tool_registry;

// ── CLI ─────────────────────────────────────────────────────────────

/// Accessibility scan MCP server.
#[derive(Parser, Debug)]
#[command(name = "a11y-mcp", version, about)]
struct Cli {
    /// Config profile; keys are looked up as `{PROFILE}_{KEY}` first.
    #[arg(long, env = "A11Y_PROFILE", default_value = "")]
    profile: String,

    /// Project root holding the fallback scanner and its `output/` folder.
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Engine install directory, skipping auto-discovery.
    #[arg(long)]
    engine_dir: Option<PathBuf>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::for_profile(&cli.profile);
    if let Some(root) = cli.project_root {
        config.paths.project_root = root;
    }
    if let Some(dir) = cli.engine_dir {
        config.paths.engine_dir = Some(dir);
    }
    config.log_summary();
    tracing::debug!(config = %config.redacted_summary(), "effective config");

    let env = check_environment(&config.paths);
    let instructions = env.message.clone();

    let service = Arc::new(ScanService::new(config, env));
    let registry = scan_tool_registry(service).context("failed to register scan tools")?;

    let mut server = McpServer::new(registry).with_instructions(instructions);
    server
        .run(&mut StdioTransport::stdio())
        .await
        .context("MCP server stopped with an error")?;

    info!("a11y-mcp stopped");
    Ok(())
}

//! Report generation for finished scans.
//!
//! With the full engine installed, reports come from the engine's own export
//! script. In fallback mode a Markdown report is rendered from the result
//! rows with minijinja and written next to them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use a11y_core::{ScanError, ScanMode};

use crate::aggregate::{summarize, Summary};
use crate::reader::{read_rows, ResultRow};
use crate::runner::report_export_command;

const TEMPLATE_NAME: &str = "scan_report.md.j2";
const TEMPLATE_SOURCE: &str = include_str!("../templates/scan_report.md.j2");

/// Outcome of running the engine's export script.
#[derive(Debug, Clone, Serialize)]
pub struct EngineExport {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Files found under `<engine>/reports/<results-folder>`, sorted.
    pub report_files: Vec<PathBuf>,
}

/// Run `export_report_data.py` for one results folder, killing it after `limit`.
pub async fn export_with_engine(
    python: &str,
    engine_dir: &Path,
    results_folder: &str,
    limit: Duration,
) -> Result<EngineExport, ScanError> {
    let command = report_export_command(python, engine_dir, results_folder);
    let mut cmd = command.to_command();
    cmd.kill_on_drop(true);

    info!(folder = %results_folder, "running engine report export");
    let output = match tokio::time::timeout(limit, cmd.output()).await {
        Ok(result) => result.map_err(|source| ScanError::Launch {
            program: command.program.clone(),
            source,
        })?,
        Err(_) => {
            warn!(folder = %results_folder, "report export timed out");
            return Err(ScanError::Report(format!(
                "report generation timed out after {} seconds",
                limit.as_secs()
            )));
        }
    };

    let success = output.status.success();
    let report_files = if success {
        list_files(&engine_dir.join("reports").join(results_folder))
    } else {
        Vec::new()
    };

    Ok(EngineExport {
        exit_code: output.status.code(),
        success,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        report_files,
    })
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

/// Everything the Markdown template can see.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub audit_name: String,
    pub scan_date: String,
    pub base_url: String,
    pub pages_scanned: usize,
    pub total_issues: usize,
    pub summary: Summary,
    pub results: Vec<ResultRow>,
    pub generated_at: String,
    pub scan_mode: ScanMode,
}

impl ReportContext {
    /// Build the context from a results directory.
    pub fn from_results_dir(
        dir: &Path,
        audit_name: &str,
        started_at: DateTime<Local>,
        scan_mode: ScanMode,
    ) -> Self {
        let results = read_rows(dir, None, None, None);
        let summary = summarize(dir);

        let base_url = results
            .first()
            .and_then(|row| row.get("base_url"))
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        let pages_scanned = results
            .iter()
            .map(|row| row.get("url").map(String::as_str).unwrap_or(""))
            .collect::<HashSet<_>>()
            .len();

        Self {
            audit_name: audit_name.to_string(),
            scan_date: started_at.to_rfc3339(),
            base_url,
            pages_scanned,
            total_issues: summary.total_issues,
            summary,
            results,
            generated_at: Local::now().to_rfc3339(),
            scan_mode,
        }
    }
}

fn template_env() -> Result<minijinja::Environment<'static>, ScanError> {
    let mut env = minijinja::Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    env.add_template(TEMPLATE_NAME, TEMPLATE_SOURCE)
        .map_err(|e| ScanError::Report(e.to_string()))?;
    Ok(env)
}

/// Render the Markdown scan report.
pub fn render_markdown(ctx: &ReportContext) -> Result<String, ScanError> {
    let env = template_env()?;
    let template = env
        .get_template(TEMPLATE_NAME)
        .map_err(|e| ScanError::Report(e.to_string()))?;
    template
        .render(ctx)
        .map_err(|e| ScanError::Report(e.to_string()))
}

/// `<label>_<YYYY-mm-dd_HH-MM-SS>_report.<ext>`, with unsafe characters in
/// the label replaced by `_`.
pub fn report_filename(label: &str, ext: &str, now: DateTime<Local>) -> String {
    let safe: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}_{}_report.{ext}", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Render the report and write it into `out_dir`. Returns the file written.
pub fn write_markdown_report(ctx: &ReportContext, out_dir: &Path) -> Result<PathBuf, ScanError> {
    let markdown = render_markdown(ctx)?;
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(report_filename(&ctx.audit_name, "md", Local::now()));
    std::fs::write(&path, markdown)?;
    info!(path = %path.display(), "markdown report written");
    Ok(path)
}

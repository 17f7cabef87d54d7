//! Caller-facing operations over the tracker and the result files.
//!
//! Every operation refreshes the jobs it touches before answering, so
//! callers never see a state older than their own request. Read-side
//! operations require a completed job with a known output directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use a11y_core::{Config, ScanError, ScanMode, ScanState};

use crate::aggregate::{summarize, Summary};
use crate::config_builder::{write_engine_config, write_fallback_config, ScanOptions};
use crate::environment::EngineEnvironment;
use crate::reader::{list_result_dirs, read_rows, ResultDirEntry, ResultRow, ValueFilter};
use crate::report::{export_with_engine, write_markdown_report, ReportContext};
use crate::runner::{engine_scan_command, fallback_scan_command};
use crate::tracker::{new_job_id, ScanRecord, ScanTracker};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Scan '{0}' not found.")]
    NotFound(String),

    #[error("{}", not_ready_message(.state))]
    NotReady { state: ScanState },

    #[error("{}", report_not_ready_message(.state))]
    ReportNotReady { state: ScanState },

    #[error("Scan completed but no results directory was found.")]
    NoResultsDirectory,

    #[error("{0}")]
    Launch(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Report(String),

    #[error("Report generation failed.")]
    ReportFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

fn not_ready_message(state: &ScanState) -> &'static str {
    match state {
        ScanState::Running => "Scan is still running. Check its status until it completes.",
        _ => "Scan failed. Check its status for error details.",
    }
}

fn report_not_ready_message(state: &ScanState) -> &'static str {
    match state {
        ScanState::Running => "Scan is still running. Wait for it to complete before generating a report.",
        _ => "Scan failed. Cannot generate a report for a failed scan.",
    }
}

impl QueryError {
    /// JSON error payload for tool responses.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::json!({ "error": self.to_string() });
        match self {
            QueryError::NotReady { state } | QueryError::ReportNotReady { state } => {
                payload["status"] = serde_json::json!(state);
            }
            QueryError::ReportFailed {
                exit_code,
                stdout,
                stderr,
            } => {
                payload["return_code"] = serde_json::json!(exit_code);
                payload["stdout"] = serde_json::json!(stdout.trim());
                payload["stderr"] = serde_json::json!(stderr.trim());
            }
            _ => {}
        }
        payload
    }
}

impl From<ScanError> for QueryError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::InvalidInput(msg) => QueryError::InvalidInput(msg),
            ScanError::Launch { .. } => QueryError::Launch(e.to_string()),
            ScanError::Report(msg) => QueryError::Report(msg),
            other => QueryError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanStarted {
    pub scan_id: String,
    pub status: ScanState,
    pub scan_mode: ScanMode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanStatus {
    pub scan_id: String,
    pub status: ScanState,
    pub scan_mode: ScanMode,
    pub elapsed_seconds: i64,
    pub start_time: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_output: Vec<String>,
    /// Only populated for failed jobs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_output: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResults {
    pub scan_id: String,
    pub scan_mode: ScanMode,
    pub results_dir: PathBuf,
    pub count: usize,
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub scan_mode: ScanMode,
    pub results_dir: PathBuf,
    #[serde(flatten)]
    pub summary: Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEntry {
    pub scan_id: String,
    pub audit_name: String,
    pub status: ScanState,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub results_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanListing {
    pub scan_mode: ScanMode,
    pub active_scans: Vec<JobEntry>,
    pub result_directories: Vec<ResultDirEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub scan_id: String,
    pub scan_mode: ScanMode,
    pub results_dir: PathBuf,
    pub report_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    pub message: String,
}

/// Owns the job registry and answers every scan operation.
pub struct ScanService {
    config: Config,
    env: EngineEnvironment,
    tracker: ScanTracker,
}

impl ScanService {
    pub fn new(config: Config, env: EngineEnvironment) -> Self {
        let tracker = ScanTracker::new(env.candidate_roots(&config.paths)).with_final_drain(
            Duration::from_millis(config.runtime.final_drain_timeout_ms),
        );
        Self {
            config,
            env,
            tracker,
        }
    }

    /// Write the launch artifacts for the active mode and start the scan.
    pub async fn start_scan(
        &self,
        urls: &[String],
        label: &str,
        options: &ScanOptions,
    ) -> Result<ScanStarted, QueryError> {
        let job_id = new_job_id();
        let paths = &self.config.paths;

        let (command, artifacts) = match (self.env.mode, self.env.engine_dir.as_deref()) {
            (ScanMode::Engine, Some(engine_dir)) => {
                let (config_name, artifacts) =
                    write_engine_config(engine_dir, &job_id, label, urls, options)?;
                let command = engine_scan_command(&paths.python, engine_dir, &config_name);
                (command, artifacts)
            }
            (ScanMode::Fallback, _) => {
                let artifacts = write_fallback_config(paths, &job_id, label, urls, options)?;
                let command = fallback_scan_command(
                    &paths.python,
                    &paths.project_root,
                    &paths.fallback_scanner,
                    &artifacts.config_path,
                );
                (command, artifacts)
            }
            _ => return Err(QueryError::Unavailable(self.env.message.clone())),
        };

        if let Err(e) = self
            .tracker
            .launch_with_id(job_id.clone(), &command, label, artifacts.clone())
            .await
        {
            artifacts.remove().await;
            return Err(e.into());
        }

        Ok(ScanStarted {
            scan_id: job_id,
            status: ScanState::Running,
            scan_mode: self.env.mode,
            message: format!(
                "Scan started for {} URL(s) with audit name '{}' ({} mode).",
                urls.len(),
                label,
                self.env.mode
            ),
        })
    }

    /// Refresh one job. Artifacts are removed once, when the refresh that
    /// observes the exit happens here.
    async fn refresh(&self, job_id: &str) -> Option<ScanRecord> {
        let before = self.tracker.get(job_id).await?;
        self.tracker.refresh_status(job_id).await;
        let after = self.tracker.get(job_id).await?;
        if !before.state.is_terminal() && after.state.is_terminal() {
            self.tracker.cleanup(job_id).await;
        }
        Some(after)
    }

    pub async fn get_status(&self, job_id: &str) -> Result<ScanStatus, QueryError> {
        let record = self
            .refresh(job_id)
            .await
            .ok_or_else(|| QueryError::NotFound(job_id.to_string()))?;
        let tail = self.config.runtime.status_tail_lines;

        let error_output = if record.state == ScanState::Failed {
            record.recent_stderr(tail).to_vec()
        } else {
            Vec::new()
        };

        Ok(ScanStatus {
            scan_id: record.job_id.clone(),
            status: record.state,
            scan_mode: self.env.mode,
            elapsed_seconds: record.elapsed().num_seconds(),
            start_time: record.started_at,
            end_time: record.ended_at,
            exit_code: record.exit_code,
            results_dir: record.output_dir.clone(),
            recent_output: record.recent_stdout(tail).to_vec(),
            error_output,
        })
    }

    /// A completed job and its output directory, or why there is none.
    async fn ready(&self, job_id: &str) -> Result<(ScanRecord, PathBuf), QueryError> {
        let record = self
            .refresh(job_id)
            .await
            .ok_or_else(|| QueryError::NotFound(job_id.to_string()))?;
        if record.state != ScanState::Complete {
            return Err(QueryError::NotReady {
                state: record.state,
            });
        }
        let dir = record
            .output_dir
            .clone()
            .ok_or(QueryError::NoResultsDirectory)?;
        Ok((record, dir))
    }

    pub async fn get_results(
        &self,
        job_id: &str,
        category: Option<String>,
        impact: Option<String>,
        limit: Option<usize>,
    ) -> Result<ScanResults, QueryError> {
        let (record, dir) = self.ready(job_id).await?;

        let read_dir = dir.clone();
        let results = blocking(move || {
            let filter = impact.map(ValueFilter::impact);
            read_rows(&read_dir, category.as_deref(), filter.as_ref(), limit)
        })
        .await?;

        Ok(ScanResults {
            scan_id: record.job_id,
            scan_mode: self.env.mode,
            results_dir: dir,
            count: results.len(),
            results,
        })
    }

    pub async fn get_summary(&self, job_id: &str) -> Result<ScanSummary, QueryError> {
        let (record, dir) = self.ready(job_id).await?;

        let read_dir = dir.clone();
        let summary = blocking(move || summarize(&read_dir)).await?;

        Ok(ScanSummary {
            scan_id: record.job_id,
            scan_mode: self.env.mode,
            results_dir: dir,
            summary,
        })
    }

    /// Every tracked job, oldest first, plus every results directory on disk.
    pub async fn list_jobs(&self) -> Result<ScanListing, QueryError> {
        let ids: Vec<String> = self.tracker.list_all().await.into_keys().collect();
        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(record) = self.refresh(id).await {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.started_at.cmp(&b.started_at));

        let roots = self.tracker.candidate_roots().to_vec();
        let result_directories = blocking(move || list_result_dirs(&roots)).await?;

        Ok(ScanListing {
            scan_mode: self.env.mode,
            active_scans: records
                .into_iter()
                .map(|r| JobEntry {
                    scan_id: r.job_id,
                    audit_name: r.label,
                    status: r.state,
                    start_time: r.started_at,
                    end_time: r.ended_at,
                    results_dir: r.output_dir,
                })
                .collect(),
            result_directories,
        })
    }

    /// Produce a report for a completed job.
    pub async fn generate_report(&self, job_id: &str) -> Result<ReportOutcome, QueryError> {
        let (record, dir) = self.ready(job_id).await.map_err(|e| match e {
            QueryError::NotReady { state } => QueryError::ReportNotReady { state },
            other => other,
        })?;

        if let (ScanMode::Engine, Some(engine_dir)) = (self.env.mode, self.env.engine_dir.as_deref()) {
            return self.engine_report(record, dir, engine_dir).await;
        }

        let label = record.label.clone();
        let started_at = record.started_at;
        let mode = self.env.mode;
        let out_dir = dir.clone();
        let path = blocking(move || {
            let ctx = ReportContext::from_results_dir(&out_dir, &label, started_at, mode);
            write_markdown_report(&ctx, &out_dir)
        })
        .await??;

        Ok(ReportOutcome {
            scan_id: record.job_id,
            scan_mode: self.env.mode,
            results_dir: dir,
            report_files: vec![path],
            stdout: None,
            message: format!("Report generated successfully ({} mode).", self.env.mode),
        })
    }

    async fn engine_report(
        &self,
        record: ScanRecord,
        dir: PathBuf,
        engine_dir: &Path,
    ) -> Result<ReportOutcome, QueryError> {
        let folder = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(QueryError::NoResultsDirectory)?;

        let export = export_with_engine(
            &self.config.paths.python,
            engine_dir,
            &folder,
            Duration::from_secs(self.config.runtime.report_timeout_secs),
        )
        .await?;

        if !export.success {
            return Err(QueryError::ReportFailed {
                exit_code: export.exit_code,
                stdout: export.stdout,
                stderr: export.stderr,
            });
        }

        info!(job_id = %record.job_id, files = export.report_files.len(), "engine report exported");
        let stdout = export.stdout.trim();
        Ok(ReportOutcome {
            scan_id: record.job_id,
            scan_mode: self.env.mode,
            results_dir: dir,
            report_files: export.report_files,
            stdout: (!stdout.is_empty()).then(|| stdout.to_string()),
            message: "Report generated successfully.".to_string(),
        })
    }
}

/// Run file-heavy work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, QueryError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        debug!(error = %e, "blocking task failed");
        QueryError::Internal(e.to_string())
    })
}

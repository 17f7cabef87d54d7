//! In-memory registry of launched scan jobs.
//!
//! The tracker owns each job's child process from launch until its exit is
//! observed. Nothing runs in the background: callers drive progress by calling
//! [`ScanTracker::refresh_status`], which drains whatever output is ready,
//! checks for exit without waiting, and on exit records the terminal state and
//! resolves the job's output directory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::FutureExt;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use a11y_core::{ScanError, ScanState};

use crate::resolver;
use crate::runner::ScanCommand;

const DEFAULT_FINAL_DRAIN: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 8192;

/// Generate a fresh job identifier.
pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

/// On-disk files created for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanArtifacts {
    /// Config file handed to the engine.
    pub config_path: PathBuf,
    /// Per-job input directory (base URL list), if the engine needs one.
    pub input_dir: Option<PathBuf>,
    /// Output directory, when it is known before the engine runs.
    pub output_dir: Option<PathBuf>,
}

impl ScanArtifacts {
    /// Best-effort removal of the config file and the input directory tree.
    pub async fn remove(&self) {
        if tokio::fs::metadata(&self.config_path)
            .await
            .is_ok_and(|m| m.is_file())
        {
            if let Err(e) = tokio::fs::remove_file(&self.config_path).await {
                warn!(path = %self.config_path.display(), error = %e, "failed to remove config file");
            }
        }

        if let Some(dir) = &self.input_dir {
            if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
                if let Err(e) = tokio::fs::remove_dir_all(dir).await {
                    warn!(path = %dir.display(), error = %e, "failed to remove input directory");
                }
            }
        }
    }
}

/// Snapshot of one job. Cloned out of the registry; never aliases it.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub job_id: String,
    /// Label exactly as the caller supplied it.
    pub label: String,
    pub state: ScanState,
    pub config_path: PathBuf,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub exit_code: Option<i32>,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
}

impl ScanRecord {
    /// Time since start, frozen at `ended_at` once the job is terminal.
    pub fn elapsed(&self) -> chrono::Duration {
        self.ended_at.unwrap_or_else(Local::now) - self.started_at
    }

    /// The last `n` stdout lines.
    pub fn recent_stdout(&self, n: usize) -> &[String] {
        tail(&self.stdout_lines, n)
    }

    /// The last `n` stderr lines.
    pub fn recent_stderr(&self, n: usize) -> &[String] {
        tail(&self.stderr_lines, n)
    }

    pub fn artifacts(&self) -> ScanArtifacts {
        ScanArtifacts {
            config_path: self.config_path.clone(),
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

fn tail(lines: &[String], n: usize) -> &[String] {
    &lines[lines.len().saturating_sub(n)..]
}

/// Incremental line splitter over one child pipe.
struct LineCapture<R> {
    reader: R,
    pending: Vec<u8>,
    closed: bool,
}

impl<R: AsyncRead + Unpin> LineCapture<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            closed: false,
        }
    }

    /// Consume whatever the pipe has ready right now. Never waits.
    fn drain_ready(&mut self, out: &mut Vec<String>) {
        let mut buf = [0u8; READ_CHUNK];
        while !self.closed {
            match self.reader.read(&mut buf).now_or_never() {
                Some(Ok(0)) => self.closed = true,
                Some(Ok(n)) => self.push(&buf[..n], out),
                Some(Err(e)) => {
                    debug!(error = %e, "output pipe read failed");
                    self.closed = true;
                }
                None => break,
            }
        }
    }

    /// Read to end of stream. Only called once the child has exited.
    async fn drain_to_end(&mut self, out: &mut Vec<String>) {
        let mut buf = [0u8; READ_CHUNK];
        while !self.closed {
            match self.reader.read(&mut buf).await {
                Ok(0) => self.closed = true,
                Ok(n) => self.push(&buf[..n], out),
                Err(e) => {
                    debug!(error = %e, "output pipe read failed");
                    self.closed = true;
                }
            }
        }
    }

    /// Split complete lines out of `pending`. Bytes already buffered hold no
    /// newline, so only the new chunk is searched.
    fn push(&mut self, bytes: &[u8], out: &mut Vec<String>) {
        let mut from = self.pending.len();
        self.pending.extend_from_slice(bytes);

        let mut start = 0;
        while let Some(offset) = self.pending[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            out.push(decode_line(&self.pending[start..end]));
            start = end + 1;
            from = start;
        }
        self.pending.drain(..start);
    }

    /// Emit an unterminated trailing fragment as a final line.
    fn flush(&mut self, out: &mut Vec<String>) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            out.push(decode_line(&rest));
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Exclusive ownership of a running child and its output pipes.
struct ScanProcess {
    child: Child,
    stdout: Option<LineCapture<ChildStdout>>,
    stderr: Option<LineCapture<ChildStderr>>,
}

impl ScanProcess {
    fn drain_ready(&mut self, record: &mut ScanRecord) {
        if let Some(capture) = self.stdout.as_mut() {
            capture.drain_ready(&mut record.stdout_lines);
        }
        if let Some(capture) = self.stderr.as_mut() {
            capture.drain_ready(&mut record.stderr_lines);
        }
    }

    async fn drain_final(&mut self, record: &mut ScanRecord, limit: Duration) {
        let stdout = self.stdout.as_mut();
        let stderr = self.stderr.as_mut();
        let stdout_lines = &mut record.stdout_lines;
        let stderr_lines = &mut record.stderr_lines;
        let drain = async move {
            let out = async move {
                if let Some(capture) = stdout {
                    capture.drain_to_end(stdout_lines).await;
                }
            };
            let err = async move {
                if let Some(capture) = stderr {
                    capture.drain_to_end(stderr_lines).await;
                }
            };
            tokio::join!(out, err);
        };

        if tokio::time::timeout(limit, drain).await.is_err() {
            warn!(job_id = %record.job_id, "final output drain timed out");
        }

        if let Some(capture) = self.stdout.as_mut() {
            capture.flush(&mut record.stdout_lines);
        }
        if let Some(capture) = self.stderr.as_mut() {
            capture.flush(&mut record.stderr_lines);
        }
    }
}

/// An exited job still waiting on its output directory.
struct PendingFinish {
    label: String,
    state: ScanState,
}

fn finish(record: &mut ScanRecord, state: ScanState) {
    record.state = state;
    info!(
        job_id = %record.job_id,
        state = %record.state,
        exit_code = ?record.exit_code,
        output_dir = ?record.output_dir,
        "scan finished"
    );
}

struct ScanJob {
    record: ScanRecord,
    /// `None` once the exit has been observed and the handle released.
    process: Option<ScanProcess>,
}

/// Registry mapping job IDs to jobs.
///
/// The map sits behind an async mutex, so concurrent callers serialize on
/// every operation.
pub struct ScanTracker {
    jobs: Mutex<HashMap<String, ScanJob>>,
    candidate_roots: Vec<PathBuf>,
    final_drain: Duration,
}

impl ScanTracker {
    /// Create a tracker that resolves output directories under `candidate_roots`,
    /// searched in the given order.
    pub fn new(candidate_roots: Vec<PathBuf>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            candidate_roots,
            final_drain: DEFAULT_FINAL_DRAIN,
        }
    }

    /// Set the upper bound on the post-exit output drain.
    pub fn with_final_drain(mut self, limit: Duration) -> Self {
        self.final_drain = limit;
        self
    }

    pub fn candidate_roots(&self) -> &[PathBuf] {
        &self.candidate_roots
    }

    /// Launch `command` under a fresh job ID and register it as running.
    pub async fn create_and_launch(
        &self,
        command: &ScanCommand,
        label: &str,
        artifacts: ScanArtifacts,
    ) -> Result<String, ScanError> {
        let job_id = new_job_id();
        self.launch_with_id(job_id.clone(), command, label, artifacts)
            .await?;
        Ok(job_id)
    }

    /// Launch under an ID the caller generated (its artifacts may embed it).
    ///
    /// IDs are never reused: an ID already in the registry is rejected before
    /// anything is spawned.
    pub async fn launch_with_id(
        &self,
        job_id: String,
        command: &ScanCommand,
        label: &str,
        artifacts: ScanArtifacts,
    ) -> Result<(), ScanError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job_id) {
            return Err(ScanError::InvalidInput(format!(
                "job id '{job_id}' is already registered"
            )));
        }

        let mut child = command
            .to_command()
            .spawn()
            .map_err(|source| ScanError::Launch {
                program: command.program.clone(),
                source,
            })?;

        let process = ScanProcess {
            stdout: child.stdout.take().map(LineCapture::new),
            stderr: child.stderr.take().map(LineCapture::new),
            child,
        };

        let record = ScanRecord {
            job_id: job_id.clone(),
            label: label.to_string(),
            state: ScanState::Running,
            config_path: artifacts.config_path,
            input_dir: artifacts.input_dir,
            output_dir: artifacts.output_dir,
            started_at: Local::now(),
            ended_at: None,
            exit_code: None,
            stdout_lines: Vec::new(),
            stderr_lines: Vec::new(),
        };

        info!(
            job_id = %job_id,
            label = %label,
            program = %command.program,
            pid = ?process.child.id(),
            "scan launched"
        );

        jobs.insert(
            job_id,
            ScanJob {
                record,
                process: Some(process),
            },
        );
        Ok(())
    }

    /// Snapshot of one job.
    pub async fn get(&self, job_id: &str) -> Option<ScanRecord> {
        self.jobs.lock().await.get(job_id).map(|job| job.record.clone())
    }

    /// Advance one job's state machine. Unknown and terminal jobs are left
    /// untouched.
    ///
    /// Output-directory resolution runs on the blocking pool with the registry
    /// unlocked. The job stays `Running` until its terminal state and output
    /// directory are recorded together.
    pub async fn refresh_status(&self, job_id: &str) {
        let Some(exited) = self.observe_exit(job_id).await else {
            return;
        };

        let label = exited.label.clone();
        let roots = self.candidate_roots.clone();
        let resolved = match tokio::task::spawn_blocking(move || resolver::resolve(&label, &roots)).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "output directory lookup panicked");
                None
            }
        };

        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.record.output_dir = resolved;
            finish(&mut job.record, exited.state);
        }
    }

    /// Drain output and poll for exit under the lock. Jobs whose output
    /// directory is already known finish here; the rest are handed back for
    /// resolution.
    async fn observe_exit(&self, job_id: &str) -> Option<PendingFinish> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(job_id)?;
        if job.record.state.is_terminal() {
            return None;
        }
        let ScanJob { record, process } = job;
        let running = process.as_mut()?;

        running.drain_ready(record);

        let exit_code = match running.child.try_wait() {
            Ok(None) => return None,
            Ok(Some(status)) => status.code(),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "cannot query scan process; marking failed");
                None
            }
        };

        running.drain_final(record, self.final_drain).await;
        *process = None;

        record.ended_at = Some(Local::now());
        record.exit_code = exit_code;
        let state = if exit_code == Some(0) {
            ScanState::Complete
        } else {
            ScanState::Failed
        };

        if record.output_dir.is_some() {
            finish(record, state);
            return None;
        }
        Some(PendingFinish {
            label: record.label.clone(),
            state,
        })
    }

    /// Detached copy of every job.
    pub async fn list_all(&self) -> HashMap<String, ScanRecord> {
        self.jobs
            .lock()
            .await
            .iter()
            .map(|(id, job)| (id.clone(), job.record.clone()))
            .collect()
    }

    /// Delete a job's config file and input directory. The job itself stays
    /// registered. Safe to call repeatedly.
    pub async fn cleanup(&self, job_id: &str) {
        let artifacts = {
            let jobs = self.jobs.lock().await;
            match jobs.get(job_id) {
                Some(job) => job.record.artifacts(),
                None => return,
            }
        };
        debug!(job_id = %job_id, "removing scan artifacts");
        artifacts.remove().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn sh(script: &str) -> ScanCommand {
        ScanCommand::new("sh").arg("-c").arg(script)
    }

    fn artifacts_in(dir: &Path) -> ScanArtifacts {
        let config_path = dir.join("mcp_job.json");
        fs::write(&config_path, "{}").unwrap();
        let input_dir = dir.join("base_urls").join("mcp_job");
        fs::create_dir_all(&input_dir).unwrap();
        fs::write(input_dir.join("urls.csv"), "organisation,url,sector\n").unwrap();
        ScanArtifacts {
            config_path,
            input_dir: Some(input_dir),
            output_dir: None,
        }
    }

    /// Poll until the job leaves Running.
    async fn wait_terminal(tracker: &ScanTracker, job_id: &str) -> ScanRecord {
        for _ in 0..500 {
            tracker.refresh_status(job_id).await;
            let record = tracker.get(job_id).await.unwrap();
            if record.state.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never finished");
    }

    #[tokio::test]
    async fn test_success_transitions_to_complete_and_resolves() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("results");
        fs::create_dir(&root).unwrap();
        let tracker = ScanTracker::new(vec![root.clone()]);

        let script = format!(
            "mkdir '{}/2026-02-24_10-00-00_myjob'; echo crawling; echo done",
            root.display()
        );
        let job_id = tracker
            .create_and_launch(&sh(&script), "myjob", artifacts_in(work.path()))
            .await
            .unwrap();

        let initial = tracker.get(&job_id).await.unwrap();
        assert_eq!(initial.state, ScanState::Running);
        assert!(initial.ended_at.is_none());

        let record = wait_terminal(&tracker, &job_id).await;
        assert_eq!(record.state, ScanState::Complete);
        assert_eq!(record.exit_code, Some(0));
        assert!(record.ended_at.is_some());
        assert_eq!(record.stdout_lines, vec!["crawling", "done"]);
        assert_eq!(
            record.output_dir,
            Some(root.join("2026-02-24_10-00-00_myjob"))
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failed() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(vec![work.path().to_path_buf()]);

        let job_id = tracker
            .create_and_launch(&sh("echo boom >&2; exit 3"), "broken", artifacts_in(work.path()))
            .await
            .unwrap();

        let record = wait_terminal(&tracker, &job_id).await;
        assert_eq!(record.state, ScanState::Failed);
        assert_eq!(record.exit_code, Some(3));
        assert_eq!(record.stderr_lines, vec!["boom"]);
        assert!(record.output_dir.is_none());
    }

    #[tokio::test]
    async fn test_running_job_stays_running() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());

        let job_id = tracker
            .create_and_launch(&sh("sleep 5"), "slow", artifacts_in(work.path()))
            .await
            .unwrap();

        let started = std::time::Instant::now();
        tracker.refresh_status(&job_id).await;
        tracker.refresh_status(&job_id).await;
        assert!(started.elapsed() < Duration::from_secs(2));

        let record = tracker.get(&job_id).await.unwrap();
        assert_eq!(record.state, ScanState::Running);
        assert!(record.ended_at.is_none());
        assert!(record.stdout_lines.is_empty());
    }

    #[tokio::test]
    async fn test_output_is_captured_while_running() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());

        let job_id = tracker
            .create_and_launch(
                &sh("echo page 1; echo page 2; sleep 5"),
                "progress",
                artifacts_in(work.path()),
            )
            .await
            .unwrap();

        let mut lines = Vec::new();
        for _ in 0..200 {
            tracker.refresh_status(&job_id).await;
            lines = tracker.get(&job_id).await.unwrap().stdout_lines;
            if lines.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(lines, vec!["page 1", "page 2"]);
        assert_eq!(tracker.get(&job_id).await.unwrap().state, ScanState::Running);
    }

    #[tokio::test]
    async fn test_refresh_after_terminal_is_idempotent() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("results");
        fs::create_dir(&root).unwrap();
        let tracker = ScanTracker::new(vec![root.clone()]);

        let job_id = tracker
            .create_and_launch(&sh("echo once"), "idem", artifacts_in(work.path()))
            .await
            .unwrap();
        let first = wait_terminal(&tracker, &job_id).await;

        // A matching directory appearing later must not be picked up.
        fs::create_dir(root.join("late_idem")).unwrap();
        tracker.refresh_status(&job_id).await;
        tracker.refresh_status(&job_id).await;

        let again = tracker.get(&job_id).await.unwrap();
        assert_eq!(again.state, first.state);
        assert_eq!(again.ended_at, first.ended_at);
        assert_eq!(again.output_dir, first.output_dir);
        assert_eq!(again.stdout_lines, first.stdout_lines);
        assert_eq!(again.stderr_lines, first.stderr_lines);
    }

    #[tokio::test]
    async fn test_known_output_dir_is_not_overwritten() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("results");
        fs::create_dir(&root).unwrap();
        fs::create_dir(root.join("2026_fixed")).unwrap();
        let tracker = ScanTracker::new(vec![root.clone()]);

        let preset = work.path().join("preset_output");
        let mut artifacts = artifacts_in(work.path());
        artifacts.output_dir = Some(preset.clone());

        let job_id = tracker
            .create_and_launch(&sh("true"), "fixed", artifacts)
            .await
            .unwrap();
        let record = wait_terminal(&tracker, &job_id).await;
        assert_eq!(record.output_dir, Some(preset));
    }

    #[tokio::test]
    async fn test_unterminated_last_line_and_crlf() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());

        let job_id = tracker
            .create_and_launch(
                &sh("printf 'one\\r\\ntwo\\n\\nthree'"),
                "lines",
                artifacts_in(work.path()),
            )
            .await
            .unwrap();
        let record = wait_terminal(&tracker, &job_id).await;
        assert_eq!(record.stdout_lines, vec!["one", "two", "", "three"]);
    }

    #[test]
    fn test_line_capture_splits_across_chunks() {
        let mut capture = LineCapture::new(&b""[..]);
        let mut out = Vec::new();

        for byte in b"partial li" {
            capture.push(std::slice::from_ref(byte), &mut out);
        }
        assert!(out.is_empty());
        capture.push(b"ne\nnext\r\ntail", &mut out);
        assert_eq!(out, vec!["partial line", "next"]);

        capture.flush(&mut out);
        assert_eq!(out, vec!["partial line", "next", "tail"]);
    }

    #[test]
    fn test_line_capture_large_chunk() {
        let chunk: String = (0..50_000).map(|i| format!("line {i}\n")).collect();
        let mut capture = LineCapture::new(&b""[..]);
        let mut out = Vec::new();

        capture.push(chunk.as_bytes(), &mut out);
        assert_eq!(out.len(), 50_000);
        assert_eq!(out[0], "line 0");
        assert_eq!(out[49_999], "line 49999");
        assert!(capture.pending.is_empty());
    }

    #[tokio::test]
    async fn test_registry_usable_while_finishing() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("results");
        fs::create_dir(&root).unwrap();
        fs::create_dir(root.join("2026_shared")).unwrap();
        let tracker = std::sync::Arc::new(ScanTracker::new(vec![root.clone()]));

        let done = tracker
            .create_and_launch(&sh("true"), "shared", artifacts_in(work.path()))
            .await
            .unwrap();
        let other = tracker
            .create_and_launch(&sh("sleep 5"), "other", artifacts_in(work.path()))
            .await
            .unwrap();

        let finishing = {
            let tracker = tracker.clone();
            let done = done.clone();
            tokio::spawn(async move { wait_terminal(&tracker, &done).await })
        };
        for _ in 0..20 {
            tracker.refresh_status(&other).await;
            assert_eq!(tracker.get(&other).await.unwrap().state, ScanState::Running);
        }

        let record = finishing.await.unwrap();
        assert_eq!(record.state, ScanState::Complete);
        assert_eq!(record.output_dir, Some(root.join("2026_shared")));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());

        let job_id = tracker
            .create_and_launch(&sh("printf 'ok \\377\\n'"), "bytes", artifacts_in(work.path()))
            .await
            .unwrap();
        let record = wait_terminal(&tracker, &job_id).await;
        assert_eq!(record.stdout_lines, vec!["ok \u{FFFD}"]);
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());

        let err = tracker
            .create_and_launch(
                &ScanCommand::new("/nonexistent/engine-binary"),
                "nope",
                artifacts_in(work.path()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Launch { .. }));
        assert!(tracker.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());

        tracker
            .launch_with_id("fixed-id".to_string(), &sh("true"), "a", artifacts_in(work.path()))
            .await
            .unwrap();
        let err = tracker
            .launch_with_id("fixed-id".to_string(), &sh("true"), "b", artifacts_in(work.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput(_)));
        assert_eq!(tracker.get("fixed-id").await.unwrap().label, "a");
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());
        let a = tracker
            .create_and_launch(&sh("true"), "x", artifacts_in(work.path()))
            .await
            .unwrap();
        let b = tracker
            .create_and_launch(&sh("true"), "x", artifacts_in(work.path()))
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[tokio::test]
    async fn test_list_all_is_a_snapshot() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());
        let job_id = tracker
            .create_and_launch(&sh("true"), "snap", artifacts_in(work.path()))
            .await
            .unwrap();

        let mut all = tracker.list_all().await;
        assert!(all.contains_key(&job_id));
        all.get_mut(&job_id).unwrap().label = "mutated".to_string();
        all.clear();

        let record = tracker.get(&job_id).await.unwrap();
        assert_eq!(record.label, "snap");
        assert_eq!(tracker.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_artifacts_but_keeps_record() {
        let work = tempfile::tempdir().unwrap();
        let tracker = ScanTracker::new(Vec::new());
        let artifacts = artifacts_in(work.path());
        let config_path = artifacts.config_path.clone();
        let input_dir = artifacts.input_dir.clone().unwrap();

        let job_id = tracker
            .create_and_launch(&sh("true"), "clean", artifacts)
            .await
            .unwrap();
        wait_terminal(&tracker, &job_id).await;

        tracker.cleanup(&job_id).await;
        assert!(!config_path.exists());
        assert!(!input_dir.exists());
        assert!(tracker.get(&job_id).await.is_some());

        // second call finds nothing to delete
        tracker.cleanup(&job_id).await;
        assert!(tracker.get(&job_id).await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_job_is_a_noop() {
        let tracker = ScanTracker::new(Vec::new());
        tracker.refresh_status("nonexistent").await;
        tracker.cleanup("nonexistent").await;
        assert!(tracker.get("nonexistent").await.is_none());
    }

    #[test]
    fn test_recent_output_tail() {
        let record = ScanRecord {
            job_id: "id".to_string(),
            label: "l".to_string(),
            state: ScanState::Running,
            config_path: PathBuf::from("c.json"),
            input_dir: None,
            output_dir: None,
            started_at: Local::now(),
            ended_at: None,
            exit_code: None,
            stdout_lines: (0..30).map(|i| i.to_string()).collect(),
            stderr_lines: Vec::new(),
        };
        let tail = record.recent_stdout(20);
        assert_eq!(tail.len(), 20);
        assert_eq!(tail[0], "10");
        assert!(record.recent_stderr(20).is_empty());
    }
}

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub paths: PathsConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `A11Y_PROFILE`. When set (e.g. `CI`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("A11Y_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            paths: PathsConfig::from_env_profiled(p),
            runtime: RuntimeConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  project:     root={}", self.paths.project_root.display());
        tracing::info!(
            "  engine:      path={}",
            self.paths
                .engine_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(auto-discover)".to_string())
        );
        tracing::info!("  python:      {}", self.paths.python);
        tracing::info!(
            "  runtime:     tail_lines={}, drain_timeout_ms={}, report_timeout_secs={}",
            self.runtime.status_tail_lines,
            self.runtime.final_drain_timeout_ms,
            self.runtime.report_timeout_secs
        );
    }

    /// Return a view safe for tool responses.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "paths": {
                "project_root": self.paths.project_root,
                "engine_dir": self.paths.engine_dir,
                "python": self.paths.python,
            },
            "runtime": {
                "status_tail_lines": self.runtime.status_tail_lines,
                "final_drain_timeout_ms": self.runtime.final_drain_timeout_ms,
                "report_timeout_secs": self.runtime.report_timeout_secs,
            },
        })
    }
}

// ── Paths ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of this project; the fallback scanner writes under `<root>/output`.
    pub project_root: PathBuf,
    /// Explicit engine install directory. `None` means auto-discover.
    pub engine_dir: Option<PathBuf>,
    /// Interpreter used to run the engine and the fallback scanner.
    pub python: String,
    /// Fallback scanner entry script, relative to the project root.
    pub fallback_scanner: PathBuf,
    /// axe-core bundle, relative to the project root.
    pub axe_core_script: PathBuf,
}

impl PathsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let project_root = profiled_env_opt(p, "PROJECT_ROOT")
            .map(PathBuf::from)
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            project_root,
            engine_dir: profiled_env_opt(p, "CWAC_PATH").map(PathBuf::from),
            python: profiled_env_or(p, "PYTHON", "python3"),
            fallback_scanner: PathBuf::from(profiled_env_or(
                p,
                "FALLBACK_SCANNER",
                "scanner/axe_scanner.py",
            )),
            axe_core_script: PathBuf::from(profiled_env_or(
                p,
                "AXE_CORE_SCRIPT",
                "node_modules/axe-core/axe.min.js",
            )),
        }
    }

    /// Where the fallback scanner writes its timestamped result folders.
    pub fn fallback_output_root(&self) -> PathBuf {
        self.project_root.join("output")
    }
}

// ── Runtime knobs ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of trailing output lines returned by status queries.
    pub status_tail_lines: usize,
    /// Upper bound on the post-exit pipe drain.
    pub final_drain_timeout_ms: u64,
    /// Upper bound on the engine's report export step.
    pub report_timeout_secs: u64,
}

impl RuntimeConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            status_tail_lines: profiled_env_usize(p, "STATUS_TAIL_LINES", 20),
            final_drain_timeout_ms: profiled_env_u64(p, "FINAL_DRAIN_TIMEOUT_MS", 5_000),
            report_timeout_secs: profiled_env_u64(p, "REPORT_TIMEOUT_SECS", 300),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            status_tail_lines: 20,
            final_drain_timeout_ms: 5_000,
            report_timeout_secs: 300,
        }
    }
}

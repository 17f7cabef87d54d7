//! Engine discovery and scan mode selection.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use a11y_core::config::PathsConfig;
use a11y_core::ScanMode;

use crate::runner::ENGINE_ENTRY;

const ENGINE_DIR_NAME: &str = "cwac";
const WORKSPACE_ENGINE_DIR: &str = "/workspaces/cwac";

/// What this process can scan with, decided once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct EngineEnvironment {
    pub mode: ScanMode,
    /// Engine install directory, set only in engine mode.
    pub engine_dir: Option<PathBuf>,
    /// Human-readable explanation of the mode.
    pub message: String,
}

impl EngineEnvironment {
    pub fn new(mode: ScanMode, engine_dir: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            mode,
            engine_dir,
            message: message.into(),
        }
    }

    /// Directories whose children may be a job's output folder, in search order.
    pub fn candidate_roots(&self, paths: &PathsConfig) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(engine) = &self.engine_dir {
            roots.push(engine.join("results"));
        }
        roots.push(paths.fallback_output_root());
        roots
    }
}

fn has_engine_entry(dir: &Path) -> bool {
    dir.join(ENGINE_ENTRY).is_file()
}

/// Locations checked after the configured one, in order.
fn default_engine_locations(project_root: &Path) -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(parent) = project_root.parent() {
        locations.push(parent.join(ENGINE_DIR_NAME));
    }
    locations.push(PathBuf::from(WORKSPACE_ENGINE_DIR));
    if let Some(home) = dirs::home_dir() {
        locations.push(
            home.join(".local")
                .join("share")
                .join("di-test")
                .join(ENGINE_DIR_NAME),
        );
    }
    locations
}

/// An explicitly configured directory is taken as-is; discovered ones must
/// contain the engine entry script.
fn discover_among(configured: Option<&Path>, locations: &[PathBuf]) -> Option<PathBuf> {
    if let Some(dir) = configured.filter(|d| d.is_dir()) {
        return Some(dir.to_path_buf());
    }
    locations.iter().find(|d| has_engine_entry(d)).cloned()
}

/// Find the engine install directory.
pub fn discover_engine_dir(paths: &PathsConfig) -> Option<PathBuf> {
    discover_among(
        paths.engine_dir.as_deref(),
        &default_engine_locations(&paths.project_root),
    )
}

/// Decide the scan mode.
pub fn check_environment(paths: &PathsConfig) -> EngineEnvironment {
    let env = detect(paths, discover_engine_dir(paths));
    match env.mode {
        ScanMode::Unavailable => warn!("{}", env.message),
        _ => info!(mode = %env.mode, "{}", env.message),
    }
    env
}

fn detect(paths: &PathsConfig, engine_dir: Option<PathBuf>) -> EngineEnvironment {
    if let Some(dir) = engine_dir.filter(|d| has_engine_entry(d)) {
        let message = format!("Full mode: engine found at {}", dir.display());
        return EngineEnvironment::new(ScanMode::Engine, Some(dir), message);
    }

    let scanner = paths.project_root.join(&paths.fallback_scanner);
    let axe = paths.project_root.join(&paths.axe_core_script);
    let mut missing = Vec::new();
    if !scanner.is_file() {
        missing.push(scanner.display().to_string());
    }
    if !axe.is_file() {
        missing.push(axe.display().to_string());
    }

    if missing.is_empty() {
        EngineEnvironment::new(
            ScanMode::Fallback,
            None,
            "Fallback mode (axe-core only): engine not found",
        )
    } else {
        EngineEnvironment::new(
            ScanMode::Unavailable,
            None,
            format!(
                "No scanning mode available: engine not found; missing {}",
                missing.join(", ")
            ),
        )
    }
}

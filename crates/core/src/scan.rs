use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked scan job.
///
/// Transitions only ever go `Running -> Complete` or `Running -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Running,
    Complete,
    Failed,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ScanState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Running => "running",
            ScanState::Complete => "complete",
            ScanState::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which scanning engine this process drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanMode {
    /// Full engine install with every audit plugin.
    #[serde(rename = "cwac")]
    Engine,
    /// axe-core only scanner, used when the engine is not installed.
    #[serde(rename = "axe-only")]
    Fallback,
    #[serde(rename = "unavailable")]
    Unavailable,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Engine => "cwac",
            ScanMode::Fallback => "axe-only",
            ScanMode::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

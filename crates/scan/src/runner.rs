//! Command lines for the external processes this crate drives.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;

/// Engine entry script, relative to the engine install directory.
pub const ENGINE_ENTRY: &str = "cwac.py";

/// Engine report export script, relative to the engine install directory.
pub const REPORT_EXPORT_ENTRY: &str = "export_report_data.py";

/// A program invocation: what to run, with which arguments, from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ScanCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Build a process with stdin closed and both output streams piped.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// `python cwac.py <config-file-name>`, run from the engine directory.
///
/// The engine resolves the config name against its own `config/` folder.
pub fn engine_scan_command(python: &str, engine_dir: &Path, config_file_name: &str) -> ScanCommand {
    ScanCommand::new(python)
        .arg(ENGINE_ENTRY)
        .arg(config_file_name)
        .current_dir(engine_dir)
}

/// `python <scanner> <config-path>`, run from the project root.
pub fn fallback_scan_command(
    python: &str,
    project_root: &Path,
    scanner: &Path,
    config_path: &Path,
) -> ScanCommand {
    ScanCommand::new(python)
        .arg(project_root.join(scanner).to_string_lossy())
        .arg(config_path.to_string_lossy())
        .current_dir(project_root)
}

/// `python export_report_data.py <results-folder-name>`.
pub fn report_export_command(python: &str, engine_dir: &Path, results_folder: &str) -> ScanCommand {
    ScanCommand::new(python)
        .arg(REPORT_EXPORT_ENTRY)
        .arg(results_folder)
        .current_dir(engine_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_command() {
        let cmd = engine_scan_command("python3", Path::new("/opt/cwac"), "mcp_abc.json");
        assert_eq!(cmd.program, "python3");
        assert_eq!(cmd.args, vec!["cwac.py", "mcp_abc.json"]);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/opt/cwac")));
    }

    #[test]
    fn test_fallback_command_uses_absolute_paths() {
        let cmd = fallback_scan_command(
            "python3",
            Path::new("/srv/project"),
            Path::new("scanner/axe_scanner.py"),
            Path::new("/srv/project/output/x/config_1.json"),
        );
        assert_eq!(
            cmd.args,
            vec!["/srv/project/scanner/axe_scanner.py", "/srv/project/output/x/config_1.json"]
        );
    }

    #[test]
    fn test_report_export_command() {
        let cmd = report_export_command("py", Path::new("/opt/cwac"), "2026_run");
        assert_eq!(cmd.args, vec!["export_report_data.py", "2026_run"]);
    }
}

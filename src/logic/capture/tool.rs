//! Capture Tool Adapter
//!
//! OS-keyed lookup of the external acquisition binary, construction of the
//! command line, and the runner seam that actually executes it.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

// ============================================================================
// OS FAMILY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsFamily {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl OsFamily {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => OsFamily::Windows,
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::MacOs,
            _ => OsFamily::Other,
        }
    }

    /// Name recorded in sidecars and status messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "Windows",
            OsFamily::Linux => "Linux",
            OsFamily::MacOs => "Darwin",
            OsFamily::Other => std::env::consts::OS,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RESOLUTION TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Invocation {
    /// `<tool> <output>`
    Direct,
    /// `sudo <tool> <output>`, after marking the tool executable
    Elevated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub os: OsFamily,
    pub binary: &'static str,
    pub display_name: &'static str,
    pub invocation: Invocation,
    /// Shown in the status while the tool runs
    pub progress_message: &'static str,
}

pub const TOOL_TABLE: &[ToolSpec] = &[
    ToolSpec {
        os: OsFamily::Windows,
        binary: "winpmem.exe",
        display_name: "WinPMEM",
        invocation: Invocation::Direct,
        progress_message: "Acquiring Windows physical memory (WinPMEM)...",
    },
    ToolSpec {
        os: OsFamily::Linux,
        binary: "avml",
        display_name: "AVML",
        invocation: Invocation::Elevated,
        progress_message: "Acquiring Linux memory (LiME/AVML)...",
    },
];

pub fn tool_spec(os: OsFamily) -> Option<&'static ToolSpec> {
    TOOL_TABLE.iter().find(|spec| spec.os == os)
}

/// Locate the tool for `os` inside `tool_dir`.
pub fn resolve_tool(os: OsFamily, tool_dir: &Path) -> Result<(&'static ToolSpec, PathBuf), CaptureError> {
    let spec = tool_spec(os).ok_or_else(|| CaptureError::UnsupportedPlatform {
        os: os.to_string(),
    })?;

    let path = tool_dir.join(spec.binary);
    if !path.is_file() {
        return Err(CaptureError::ToolNotFound {
            tool: spec.display_name.to_string(),
            path,
        });
    }

    Ok((spec, path))
}

// ============================================================================
// COMMAND
// ============================================================================

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Tool binary that must be marked executable first (Unix only)
    pub make_executable: Option<PathBuf>,
}

impl ToolCommand {
    pub fn build(spec: &ToolSpec, tool_path: &Path, output: &Path) -> Self {
        let output = output.to_string_lossy().to_string();
        match spec.invocation {
            Invocation::Direct => Self {
                program: tool_path.to_path_buf(),
                args: vec![output],
                make_executable: None,
            },
            Invocation::Elevated => Self {
                program: PathBuf::from("sudo"),
                args: vec![tool_path.to_string_lossy().to_string(), output],
                make_executable: Some(tool_path.to_path_buf()),
            },
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What the tool left behind on exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stderr, or stdout when the tool wrote nothing to stderr.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

// ============================================================================
// RUNNER SEAM
// ============================================================================

/// Executes a tool command to completion.
pub trait ToolRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> io::Result<ToolOutput>;
}

/// Runs the command as a child process, blocking until it exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand) -> io::Result<ToolOutput> {
        if let Some(tool) = &command.make_executable {
            make_executable(tool)?;
        }

        let output = Command::new(&command.program).args(&command.args).output()?;

        Ok(ToolOutput {
            // Killed by a signal: no code
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_windows_and_linux() {
        assert_eq!(tool_spec(OsFamily::Windows).map(|s| s.binary), Some("winpmem.exe"));
        assert_eq!(tool_spec(OsFamily::Linux).map(|s| s.binary), Some("avml"));
        assert!(tool_spec(OsFamily::MacOs).is_none());
    }

    #[test]
    fn test_windows_command_is_direct() {
        let spec = tool_spec(OsFamily::Windows).unwrap();
        let cmd = ToolCommand::build(spec, Path::new("C:/nexus/winpmem.exe"), Path::new("C:/nexus/c.raw"));
        assert_eq!(cmd.program, PathBuf::from("C:/nexus/winpmem.exe"));
        assert_eq!(cmd.args, vec!["C:/nexus/c.raw".to_string()]);
        assert!(cmd.make_executable.is_none());
    }

    #[test]
    fn test_linux_command_is_elevated() {
        let spec = tool_spec(OsFamily::Linux).unwrap();
        let cmd = ToolCommand::build(spec, Path::new("/opt/nexus/avml"), Path::new("/opt/nexus/c.lime"));
        assert_eq!(cmd.program, PathBuf::from("sudo"));
        assert_eq!(cmd.args, vec!["/opt/nexus/avml".to_string(), "/opt/nexus/c.lime".to_string()]);
        assert_eq!(cmd.make_executable, Some(PathBuf::from("/opt/nexus/avml")));
        assert_eq!(cmd.to_string(), "sudo /opt/nexus/avml /opt/nexus/c.lime");
    }

    #[test]
    fn test_resolve_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        match resolve_tool(OsFamily::Linux, dir.path()) {
            Err(CaptureError::ToolNotFound { tool, path }) => {
                assert_eq!(tool, "AVML");
                assert_eq!(path, dir.path().join("avml"));
            }
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
        assert!(matches!(
            resolve_tool(OsFamily::MacOs, dir.path()),
            Err(CaptureError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_resolve_present_tool() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("winpmem.exe"), b"MZ").unwrap();
        let (spec, path) = resolve_tool(OsFamily::Windows, dir.path()).unwrap();
        assert_eq!(spec.invocation, Invocation::Direct);
        assert_eq!(path, dir.path().join("winpmem.exe"));
    }

    #[test]
    fn test_diagnostics_prefers_stderr() {
        let out = ToolOutput {
            exit_code: 1,
            stdout: "progress".to_string(),
            stderr: "  bad pages \n".to_string(),
        };
        assert_eq!(out.diagnostics(), "bad pages");
        let out = ToolOutput {
            stderr: String::new(),
            ..out
        };
        assert_eq!(out.diagnostics(), "progress");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_captures_streams() {
        let cmd = ToolCommand {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            make_executable: None,
        };
        let output = ProcessRunner.run(&cmd).unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }
}

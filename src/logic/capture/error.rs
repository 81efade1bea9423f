//! Capture Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Every way an acquisition attempt can end without a usable dump.
/// All variants are terminal for the attempt; nothing is retried.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("A capture is already in progress.")]
    Conflict,

    #[error("Capture tool ({tool}) not found at {}. Please place it in the app folder.", .path.display())]
    ToolNotFound { tool: String, path: PathBuf },

    #[error("Memory capture is not supported on {os}.")]
    UnsupportedPlatform { os: String },

    #[error("Refusing to overwrite existing file {}.", .path.display())]
    OutputExists { path: PathBuf },

    #[error("Insufficient disk space. Need {required_human}.")]
    InsufficientDisk {
        required_human: String,
        required_bytes: u64,
        available_bytes: u64,
    },

    #[error("Tool failed (Code {exit_code}): {output}")]
    ToolExecutionFailed { exit_code: i32, output: String },

    /// `exit_code` and `output` are only reported when the tool itself failed.
    #[error(
        "Output file is missing or empty after capture: {}{}",
        .path.display(),
        tool_failure_suffix(.exit_code, .output)
    )]
    EmptyOutput {
        path: PathBuf,
        exit_code: i32,
        output: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to write capture metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Unexpected capture failure: {0}")]
    Unexpected(String),
}

impl CaptureError {
    /// Short machine-readable kind, stable across message wording.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Conflict => "conflict",
            CaptureError::ToolNotFound { .. } => "tool_not_found",
            CaptureError::UnsupportedPlatform { .. } => "tool_not_found",
            CaptureError::OutputExists { .. } => "output_exists",
            CaptureError::InsufficientDisk { .. } => "insufficient_disk",
            CaptureError::ToolExecutionFailed { .. } => "tool_execution_failed",
            CaptureError::EmptyOutput { .. } => "empty_output",
            CaptureError::Io(_) | CaptureError::Metadata(_) | CaptureError::Unexpected(_) => {
                "unexpected"
            }
        }
    }
}

fn tool_failure_suffix(exit_code: &i32, output: &str) -> String {
    match (*exit_code, output.trim()) {
        (0, _) => String::new(),
        (code, "") => format!(" (Tool failed (Code {}))", code),
        (code, text) => format!(" (Tool failed (Code {}): {})", code, text),
    }
}

/// Bytes as "N.NN GB".
pub fn human_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / 1024f64.powi(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_gb() {
        assert_eq!(human_gb(0), "0.00 GB");
        assert_eq!(human_gb(8 * 1024 * 1024 * 1024 + 500 * 1024 * 1024), "8.49 GB");
    }

    #[test]
    fn test_messages_carry_detail() {
        let err = CaptureError::InsufficientDisk {
            required_human: human_gb(2 * 1024 * 1024 * 1024),
            required_bytes: 2 * 1024 * 1024 * 1024,
            available_bytes: 0,
        };
        assert_eq!(err.to_string(), "Insufficient disk space. Need 2.00 GB.");
        assert_eq!(err.kind(), "insufficient_disk");

        let err = CaptureError::ToolExecutionFailed {
            exit_code: 2,
            output: "access denied".to_string(),
        };
        assert!(err.to_string().contains("Code 2"));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_empty_output_carries_tool_failure() {
        let err = CaptureError::EmptyOutput {
            path: PathBuf::from("/cases/c.raw"),
            exit_code: 1,
            output: "sudo: a terminal is required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Output file is missing or empty after capture: /cases/c.raw \
             (Tool failed (Code 1): sudo: a terminal is required)"
        );
        assert_eq!(err.kind(), "empty_output");

        let err = CaptureError::EmptyOutput {
            path: PathBuf::from("/cases/c.raw"),
            exit_code: 0,
            output: "done".to_string(),
        };
        assert_eq!(err.to_string(), "Output file is missing or empty after capture: /cases/c.raw");
    }
}

//! Exit Code Verdict
//!
//! Capture tools exit non-zero when they hit unreadable ("bad") pages even
//! though the dump is nearly complete. The file on disk is trusted over the
//! exit code:
//!
//! | output file        | exit code | verdict                         |
//! |--------------------|-----------|---------------------------------|
//! | missing or 0 bytes | any       | fail: empty output              |
//! | > evidence floor   | non-zero  | proceed with warning            |
//! | <= evidence floor  | non-zero  | fail: tool execution failed     |
//! | non-empty          | 0         | proceed                         |

use std::fs;
use std::io;
use std::path::Path;

/// Dumps above this size are usable even when the tool reports an error.
pub const EVIDENCE_FLOOR_BYTES: u64 = 100 * 1024 * 1024;

/// What the tool left on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEvidence {
    pub exists: bool,
    pub size_bytes: u64,
}

impl FileEvidence {
    pub fn missing() -> Self {
        Self {
            exists: false,
            size_bytes: 0,
        }
    }

    pub fn present(size_bytes: u64) -> Self {
        Self {
            exists: true,
            size_bytes,
        }
    }

    /// Stat `path`. A missing file is evidence too, not an error.
    pub fn inspect(path: &Path) -> io::Result<Self> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Self::present(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::missing()),
            Err(e) => Err(e),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.exists || self.size_bytes == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    EmptyOutput,
    ToolExecutionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    /// Non-zero exit, but the dump is large enough to keep.
    ProceedWithWarning,
    Fail(FailureKind),
}

pub fn evaluate(exit_code: i32, evidence: FileEvidence, evidence_floor: u64) -> Verdict {
    if evidence.is_empty() {
        return Verdict::Fail(FailureKind::EmptyOutput);
    }
    if exit_code == 0 {
        return Verdict::Proceed;
    }
    if evidence.size_bytes > evidence_floor {
        Verdict::ProceedWithWarning
    } else {
        Verdict::Fail(FailureKind::ToolExecutionFailed)
    }
}

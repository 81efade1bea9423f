//! Capture Pipeline
//!
//! preflight -> invoke -> verdict -> verify -> sidecar
//!
//! Pure with respect to orchestrator state: progress goes out through the
//! `report` callback and the result comes back as a value. Finalizing the
//! status is the caller's job.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{human_gb, CaptureError};
use super::sidecar;
use super::tool::{self, ToolCommand, ToolRunner};
use super::types::{CaptureMetadata, CaptureOutcome, CaptureRequest};
use super::verdict::{self, FailureKind, FileEvidence, Verdict};
use crate::logic::collector::{self, SystemSampler};
use crate::logic::config::CaptureConfig;

/// Collaborators the pipeline needs.
pub struct PipelineContext<'a> {
    pub config: &'a CaptureConfig,
    pub sampler: &'a dyn SystemSampler,
    pub runner: &'a dyn ToolRunner,
}

/// Where the dump for `request` is written.
pub fn resolve_output_path(storage_dir: &Path, request: &CaptureRequest) -> PathBuf {
    match &request.output {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => storage_dir.join(path),
        None => storage_dir.join(request.default_file_name()),
    }
}

pub fn run_pipeline(
    ctx: &PipelineContext<'_>,
    request: &CaptureRequest,
    output_path: &Path,
    report: &dyn Fn(u8, &str),
) -> Result<CaptureOutcome, CaptureError> {
    let config = ctx.config;

    // 1. Tool discovery. Nothing else is checked without a tool.
    let (spec, tool_path) = tool::resolve_tool(config.os, &config.tool_dir)?;
    log::info!("Capture tool: {} ({})", spec.display_name, tool_path.display());

    if output_path.exists() {
        return Err(CaptureError::OutputExists {
            path: output_path.to_path_buf(),
        });
    }

    // 2. Disk capacity
    report(10, "Checking disk space...");
    let volume = collector::volume_lookup_path(output_path);
    fs::create_dir_all(&volume)?;

    let required = ctx.sampler.total_memory().saturating_add(config.safety_margin_bytes);
    let available = ctx.sampler.available_space(&volume)?;
    if available < required {
        return Err(CaptureError::InsufficientDisk {
            required_human: human_gb(required),
            required_bytes: required,
            available_bytes: available,
        });
    }
    log::debug!("Disk preflight ok: need {} bytes, {} free", required, available);

    // 3. Invocation (blocks until the tool exits)
    let command = ToolCommand::build(spec, &tool_path, output_path);
    report(20, spec.progress_message);
    log::info!("Starting capture: {}", command);

    let tool_output = ctx.runner.run(&command)?;
    log::info!("Capture tool exited with code {}", tool_output.exit_code);

    // 4 + 5. Exit code reinterpretation and verification
    report(80, "Verifying output...");
    let evidence = FileEvidence::inspect(output_path)?;
    let mut warnings = Vec::new();

    match verdict::evaluate(tool_output.exit_code, evidence, config.evidence_floor_bytes) {
        Verdict::Proceed => {}
        Verdict::ProceedWithWarning => {
            let warning = format!(
                "Tool reported read errors (Code {}), but dump file was created.",
                tool_output.exit_code
            );
            log::warn!("{}", warning);
            warnings.push(warning);
        }
        Verdict::Fail(FailureKind::EmptyOutput) => {
            if tool_output.exit_code != 0 {
                log::error!(
                    "Tool exited with code {} and left no output: {}",
                    tool_output.exit_code,
                    tool_output.diagnostics()
                );
            }
            return Err(CaptureError::EmptyOutput {
                path: output_path.to_path_buf(),
                exit_code: tool_output.exit_code,
                output: tool_output.diagnostics(),
            });
        }
        Verdict::Fail(FailureKind::ToolExecutionFailed) => {
            return Err(CaptureError::ToolExecutionFailed {
                exit_code: tool_output.exit_code,
                output: tool_output.diagnostics(),
            });
        }
    }

    // 6. Sidecar, before anyone can observe `completed`
    let mut metadata = CaptureMetadata::from_request(request, config.os.as_str(), evidence.size_bytes);
    if config.hash_output {
        report(85, "Hashing dump...");
        metadata.sha256 = Some(sidecar::sha256_file(output_path)?);
    }
    report(90, "Writing case metadata...");
    let metadata_path = sidecar::write_metadata(output_path, &metadata)?;

    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    log::info!(
        "Memory dumped to {} ({} bytes)",
        output_path.display(),
        evidence.size_bytes
    );

    Ok(CaptureOutcome {
        output_path: output_path.to_path_buf(),
        metadata_path,
        file_name,
        file_size_bytes: evidence.size_bytes,
        exit_code: tool_output.exit_code,
        warnings,
    })
}

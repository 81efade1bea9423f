//! Acquisition Orchestrator
//!
//! Owns the capture status and guarantees at most one capture in flight.
//! Two thin adapters share one pipeline:
//! - `start_capture`: fire-and-forget, runs on a worker thread, result lands in the status
//! - `capture_blocking`: runs on the caller's thread and also returns the result

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use super::error::CaptureError;
use super::pipeline::{self, PipelineContext};
use super::tool::{ProcessRunner, ToolRunner};
use super::types::{CaptureOutcome, CaptureRequest, CaptureState, CaptureStatus};
use crate::logic::collector::{SysinfoSampler, SystemSampler};
use crate::logic::config::CaptureConfig;

struct Inner {
    config: CaptureConfig,
    sampler: Arc<dyn SystemSampler>,
    runner: Arc<dyn ToolRunner>,
    status: Mutex<CaptureStatus>,
}

/// Cheap to clone; clones share the same status.
#[derive(Clone)]
pub struct AcquisitionOrchestrator {
    inner: Arc<Inner>,
}

impl AcquisitionOrchestrator {
    pub fn new(config: CaptureConfig, sampler: Arc<dyn SystemSampler>, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sampler,
                runner,
                status: Mutex::new(CaptureStatus::default()),
            }),
        }
    }

    /// Live sysinfo sampler and real child processes.
    pub fn with_system(config: CaptureConfig) -> Self {
        Self::new(config, Arc::new(SysinfoSampler::new()), Arc::new(ProcessRunner))
    }

    pub fn storage_dir(&self) -> &Path {
        &self.inner.config.storage_dir
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.inner.config
    }

    pub fn query_status(&self) -> CaptureStatus {
        self.inner.status.lock().clone()
    }

    pub fn output_path_for(&self, request: &CaptureRequest) -> PathBuf {
        pipeline::resolve_output_path(self.storage_dir(), request)
    }

    // ========================================================================
    // ADAPTERS
    // ========================================================================

    /// Accept the request and capture in the background. Returns the dump's file name.
    pub fn start_capture(&self, request: CaptureRequest) -> Result<String, CaptureError> {
        let output_path = self.output_path_for(&request);
        let file_name = file_name_of(&output_path);

        self.inner.begin()?;
        log::info!("Capture accepted: case {} -> {}", request.case_id, output_path.display());

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("nexus-capture".to_string())
            .spawn(move || {
                let result = inner.run_guarded(&request, &output_path);
                inner.finalize(&result);
            });

        if let Err(e) = spawned {
            let err = CaptureError::Io(e);
            self.inner.finalize(&Err(CaptureError::Unexpected(err.to_string())));
            return Err(err);
        }

        Ok(file_name)
    }

    /// Capture on the calling thread. The status is updated exactly as in the
    /// background path and the error is also returned.
    pub fn capture_blocking(&self, request: CaptureRequest) -> Result<CaptureOutcome, CaptureError> {
        let output_path = self.output_path_for(&request);

        self.inner.begin()?;
        log::info!("Capture started: case {} -> {}", request.case_id, output_path.display());

        let result = self.inner.run_guarded(&request, &output_path);
        self.inner.finalize(&result);
        result
    }
}

impl Inner {
    /// Atomic check-and-set: idle/completed/error -> running.
    fn begin(&self) -> Result<(), CaptureError> {
        let mut status = self.status.lock();
        if status.status == CaptureState::Running {
            return Err(CaptureError::Conflict);
        }
        *status = CaptureStatus {
            status: CaptureState::Running,
            progress: 0,
            message: "Initializing...".to_string(),
            filename: None,
            error: None,
        };
        Ok(())
    }

    fn report(&self, progress: u8, message: &str) {
        let mut status = self.status.lock();
        if status.status == CaptureState::Running {
            status.progress = progress;
            status.message = message.to_string();
        }
    }

    /// Run the pipeline, turning a panic into the catch-all error.
    fn run_guarded(&self, request: &CaptureRequest, output_path: &Path) -> Result<CaptureOutcome, CaptureError> {
        let ctx = PipelineContext {
            config: &self.config,
            sampler: self.sampler.as_ref(),
            runner: self.runner.as_ref(),
        };
        let report = |progress: u8, message: &str| self.report(progress, message);

        panic::catch_unwind(AssertUnwindSafe(|| {
            pipeline::run_pipeline(&ctx, request, output_path, &report)
        }))
        .unwrap_or_else(|payload| {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "capture worker panicked".to_string());
            Err(CaptureError::Unexpected(detail))
        })
    }

    fn finalize(&self, result: &Result<CaptureOutcome, CaptureError>) {
        let mut status = self.status.lock();
        match result {
            Ok(outcome) => {
                let mut message = format!("Acquisition successful ({}).", self.config.os);
                for warning in &outcome.warnings {
                    message.push(' ');
                    message.push_str(warning);
                }
                *status = CaptureStatus {
                    status: CaptureState::Completed,
                    progress: 100,
                    message,
                    filename: Some(outcome.file_name.clone()),
                    error: None,
                };
                log::info!("Capture completed: {}", outcome.file_name);
            }
            Err(e) => {
                let text = e.to_string();
                status.status = CaptureState::Error;
                status.message = text.clone();
                status.error = Some(text);
                log::error!("Capture failed [{}]: {}", e.kind(), e);
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

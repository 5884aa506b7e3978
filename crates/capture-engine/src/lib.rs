//! Orchestrates the packet toolchain for capture, read and analysis.
//!
//! The engine keeps no per-call state: each operation builds its own
//! [`ProcessInvocation`], runs it as an independent OS process and turns the
//! result into an [`OperationResponse`]. The only shared resource is the
//! scratch directory for auto-named captures.

mod analysis;
mod artifact;
mod capture;
pub mod config;
pub mod error;
mod interfaces;
pub mod normalize;
mod probe;
mod reader;
mod scratch;
#[cfg(test)]
mod testing;

use config::{EngineConfig, LimitsConfig};
use error::RequestError;
use protocol::{
    AnalysisMode, AnalysisRequest, CaptureRequest, HealthReport, HealthStatus,
    InstallationStatus, InterfaceDescriptor, OperationResponse, ReadRequest,
};
use scratch::ScratchArea;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use system_utils::{ProcessInvocation, ProcessResult, ProcessRunner};

pub use interfaces::parse_interface_list;

/// Result of a capture together with the file it was written to.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub result: ProcessResult,
    pub output_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Engine {
    program: String,
    limits: LimitsConfig,
    runner: ProcessRunner,
    scratch: ScratchArea,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let max_output_bytes =
            usize::try_from(config.limits.max_output_bytes).unwrap_or(usize::MAX);
        Self {
            program: config.toolchain.program.clone(),
            runner: ProcessRunner::new(config.limits.terminate_grace, max_output_bytes),
            scratch: ScratchArea::new(config.capture.scratch_path()),
            limits: config.limits,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.root()
    }

    /// Creates the scratch directory up front. Failure is not fatal: each
    /// capture that needs an auto-named file retries and reports on its own.
    pub async fn prepare_scratch(&self) -> Result<(), RequestError> {
        self.scratch.ensure().await
    }

    pub async fn check_installation(&self) -> InstallationStatus {
        let invocation = probe::version_invocation(&self.program, self.limits.probe_timeout);
        let result = self.runner.run(&invocation).await;
        let installed = result.success();
        if installed {
            tracing::info!(
                program = %self.program,
                version = probe::version_banner(&result.stdout).unwrap_or("unknown"),
                "toolchain available"
            );
        } else {
            tracing::warn!(
                program = %self.program,
                exit_code = ?result.exit_code,
                timed_out = result.timed_out,
                reason = result.launch_error.as_deref().unwrap_or(""),
                "toolchain not available"
            );
        }
        InstallationStatus { installed }
    }

    pub async fn list_interfaces(&self) -> Vec<InterfaceDescriptor> {
        let invocation = interfaces::list_invocation(&self.program, self.limits.list_timeout);
        let result = self.runner.run(&invocation).await;
        if !result.success() {
            tracing::warn!(
                program = %self.program,
                exit_code = ?result.exit_code,
                stderr = %result.stderr.trim(),
                "interface listing failed"
            );
            return Vec::new();
        }
        parse_interface_list(&result.stdout)
    }

    /// Runs a capture and returns the raw process result. Rejected requests
    /// never start a process.
    pub async fn run_capture(
        &self,
        request: &CaptureRequest,
    ) -> Result<CaptureOutcome, RequestError> {
        let plan =
            capture::plan_capture(request, &self.program, &self.limits, &self.scratch).await?;
        tracing::info!(
            interface = %request.interface.trim(),
            duration_secs = request.duration,
            output_file = %plan.output_file.display(),
            "starting capture"
        );
        let result = self.execute("capture", &plan.invocation).await;
        Ok(CaptureOutcome {
            result,
            output_file: plan.output_file,
        })
    }

    pub async fn run_read(&self, request: &ReadRequest) -> Result<ProcessResult, RequestError> {
        let invocation = reader::plan_read(request, &self.program, &self.limits).await?;
        tracing::info!(file = %request.file_path, limit = request.limit, "reading capture");
        Ok(self.execute("read", &invocation).await)
    }

    pub async fn run_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(AnalysisMode, ProcessResult), RequestError> {
        let (mode, invocation) =
            analysis::plan_analysis(request, &self.program, &self.limits).await?;
        tracing::info!(file = %request.file_path, mode = %mode, "analyzing capture");
        Ok((mode, self.execute("analyze", &invocation).await))
    }

    pub async fn capture_packets(&self, request: &CaptureRequest) -> OperationResponse {
        match self.run_capture(request).await {
            Ok(outcome) => normalize::normalize(outcome.result)
                .with_output_file(outcome.output_file.to_string_lossy()),
            Err(err) => self.rejected("capture", &err),
        }
    }

    pub async fn read_capture(&self, request: &ReadRequest) -> OperationResponse {
        match self.run_read(request).await {
            Ok(result) => normalize::normalize(result),
            Err(err) => self.rejected("read", &err),
        }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> OperationResponse {
        match self.run_analysis(request).await {
            Ok((_, result)) => normalize::normalize(result),
            Err(err) => self.rejected("analyze", &err),
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let installed = self.check_installation().await.installed;
        let interface_count = if installed {
            self.list_interfaces().await.len()
        } else {
            0
        };
        HealthReport {
            status: if installed {
                HealthStatus::Ok
            } else {
                HealthStatus::Error
            },
            toolchain_installed: installed,
            interface_count,
            timestamp: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
        }
    }

    async fn execute(
        &self,
        operation: &'static str,
        invocation: &ProcessInvocation,
    ) -> ProcessResult {
        let result = self.runner.run(invocation).await;
        if result.success() {
            tracing::info!(
                operation,
                elapsed_ms = result.elapsed.as_millis() as u64,
                stdout_bytes = result.stdout.len(),
                "operation completed"
            );
        } else if result.timed_out {
            tracing::warn!(
                operation,
                deadline_ms = invocation.max_duration().as_millis() as u64,
                "operation timed out"
            );
        } else {
            tracing::warn!(
                operation,
                exit_code = ?result.exit_code,
                reason = result.launch_error.as_deref().unwrap_or(""),
                "operation failed"
            );
        }
        result
    }

    fn rejected(&self, operation: &'static str, err: &RequestError) -> OperationResponse {
        tracing::warn!(operation, error = %err, "request rejected");
        normalize::reject(err)
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

use crate::error::RequestError;
use protocol::OperationResponse;
use std::time::Duration;
use system_utils::ProcessResult;

/// Converts a finished process into the response shared by capture, read and
/// analyze.
pub fn normalize(result: ProcessResult) -> OperationResponse {
    let success = result.success();
    let error = if result.timed_out {
        Some(format!(
            "timed out, process terminated after {}",
            humantime::format_duration(round_to_millis(result.elapsed))
        ))
    } else if let Some(reason) = result.launch_error.clone() {
        Some(reason)
    } else if success {
        None
    } else {
        Some(match result.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        })
    };

    OperationResponse {
        success,
        stdout: result.stdout,
        stderr: result.stderr,
        exit_code: result.exit_code,
        timed_out: result.timed_out,
        output_file: None,
        error,
    }
}

pub fn reject(err: &RequestError) -> OperationResponse {
    OperationResponse::rejected(err.to_string())
}

fn round_to_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

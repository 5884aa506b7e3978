use crate::artifact::validate_capture_file;
use crate::config::LimitsConfig;
use crate::error::RequestError;
use crate::non_blank;
use protocol::ReadRequest;
use system_utils::ProcessInvocation;

/// Builds a bounded re-read of a capture file. `-c` makes the toolchain stop
/// by itself after `limit` records, so large files do not depend on the
/// deadline to terminate.
pub(crate) async fn plan_read(
    request: &ReadRequest,
    program: &str,
    limits: &LimitsConfig,
) -> Result<ProcessInvocation, RequestError> {
    if request.limit < 1 {
        return Err(RequestError::validation(format!(
            "limit must be at least 1, got {}",
            request.limit
        )));
    }
    let path = validate_capture_file(&request.file_path).await?;

    let mut invocation = ProcessInvocation::new(program, limits.read_timeout)
        .arg("-r")
        .arg(path.to_string_lossy().into_owned());
    if let Some(filter) = non_blank(request.filter.as_deref()) {
        invocation = invocation.arg("-Y").arg(filter);
    }
    Ok(invocation.arg("-c").arg(request.limit.to_string()))
}

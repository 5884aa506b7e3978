use crate::artifact::validate_capture_file;
use crate::config::LimitsConfig;
use crate::error::RequestError;
use protocol::{AnalysisMode, AnalysisRequest};
use system_utils::ProcessInvocation;

/// Resolves the analysis mode first, so an unknown mode is reported even
/// when the file is also bad.
pub(crate) async fn plan_analysis(
    request: &AnalysisRequest,
    program: &str,
    limits: &LimitsConfig,
) -> Result<(AnalysisMode, ProcessInvocation), RequestError> {
    let mode: AnalysisMode = request
        .analysis_type
        .parse()
        .map_err(|err: protocol::UnknownAnalysisMode| RequestError::validation(err.to_string()))?;
    let path = validate_capture_file(&request.file_path).await?;

    let invocation = ProcessInvocation::new(program, limits.analyze_timeout)
        .arg("-r")
        .arg(path.to_string_lossy().into_owned())
        .args(["-q", "-z", mode.statistic()]);
    Ok((mode, invocation))
}

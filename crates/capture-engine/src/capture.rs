use crate::config::LimitsConfig;
use crate::error::RequestError;
use crate::non_blank;
use crate::scratch::ScratchArea;
use protocol::CaptureRequest;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use system_utils::ProcessInvocation;

#[derive(Debug)]
pub(crate) struct CapturePlan {
    pub(crate) invocation: ProcessInvocation,
    pub(crate) output_file: PathBuf,
}

/// Validates a capture request and resolves where the capture is written.
///
/// The toolchain's own `duration:` autostop is the primary bound; the
/// invocation deadline adds `capture_overrun` on top as a backstop for a
/// process that ignores it.
pub(crate) async fn plan_capture(
    request: &CaptureRequest,
    program: &str,
    limits: &LimitsConfig,
    scratch: &ScratchArea,
) -> Result<CapturePlan, RequestError> {
    let interface = request.interface.trim();
    if interface.is_empty() {
        return Err(RequestError::validation("interface is required"));
    }
    if request.duration <= 0 {
        return Err(RequestError::validation(format!(
            "duration must be a positive number of seconds, got {}",
            request.duration
        )));
    }
    let duration_secs = request.duration.unsigned_abs();

    let output_file = match non_blank(request.output_file.as_deref()) {
        Some(path) => check_destination(Path::new(path)).await?,
        None => scratch.allocate().await?,
    };

    let deadline = Duration::from_secs(duration_secs).saturating_add(limits.capture_overrun);
    let mut invocation = ProcessInvocation::new(program, deadline)
        .args(["-i", interface])
        .arg("-a")
        .arg(format!("duration:{duration_secs}"));
    if let Some(filter) = non_blank(request.filter.as_deref()) {
        invocation = invocation.arg("-f").arg(filter);
    }
    let invocation = invocation
        .arg("-w")
        .arg(output_file.to_string_lossy().into_owned());

    Ok(CapturePlan {
        invocation,
        output_file,
    })
}

/// An existing empty file may be reused; anything with content is refused
/// rather than overwritten.
async fn check_destination(path: &Path) -> Result<PathBuf, RequestError> {
    // `-w -` makes the toolchain write packets to stdout instead of a file.
    if path.as_os_str() == "-" || path.file_name().is_none() {
        return Err(RequestError::validation(format!(
            "output file must name a file: {}",
            path.display()
        )));
    }
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => {
            return Err(RequestError::resource(format!(
                "output path is a directory: {}",
                path.display()
            )));
        }
        Ok(metadata) if metadata.len() > 0 => {
            return Err(RequestError::resource(format!(
                "refusing to overwrite non-empty file: {}",
                path.display()
            )));
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(RequestError::resource(format!(
                "cannot access {}: {err}",
                path.display()
            )));
        }
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        let parent_is_dir = tokio::fs::metadata(parent)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !parent_is_dir {
            return Err(RequestError::resource(format!(
                "output directory does not exist: {}",
                parent.display()
            )));
        }
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TempDir;

    fn request(duration: i64) -> CaptureRequest {
        CaptureRequest {
            interface: "eth0".to_string(),
            duration,
            filter: None,
            output_file: None,
        }
    }

    fn limits() -> LimitsConfig {
        LimitsConfig {
            capture_overrun: Duration::from_secs(3),
            ..LimitsConfig::default()
        }
    }

    #[tokio::test]
    async fn builds_argv_with_filter_as_single_token() {
        let temp = TempDir::new();
        let scratch = ScratchArea::new(temp.path().join("scratch"));
        let output = temp.path().join("out.pcapng");
        let request = CaptureRequest {
            filter: Some("tcp port 80 and host 10.0.0.1; reboot".to_string()),
            output_file: Some(output.to_string_lossy().into_owned()),
            ..request(7)
        };

        let plan = plan_capture(&request, "tshark", &limits(), &scratch)
            .await
            .expect("plan");

        let output_arg = output.to_string_lossy().into_owned();
        assert_eq!(plan.invocation.program(), "tshark");
        assert_eq!(
            plan.invocation.argv(),
            &[
                "-i",
                "eth0",
                "-a",
                "duration:7",
                "-f",
                "tcp port 80 and host 10.0.0.1; reboot",
                "-w",
                output_arg.as_str(),
            ]
        );
        assert_eq!(plan.output_file, output);
        assert_eq!(plan.invocation.max_duration(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn blank_filter_is_omitted() {
        let temp = TempDir::new();
        let scratch = ScratchArea::new(temp.path().to_path_buf());
        let request = CaptureRequest {
            filter: Some("   ".to_string()),
            ..request(1)
        };
        let plan = plan_capture(&request, "tshark", &limits(), &scratch)
            .await
            .expect("plan");
        assert!(!plan.invocation.argv().iter().any(|arg| arg == "-f"));
    }

    #[tokio::test]
    async fn non_positive_duration_is_rejected() {
        let temp = TempDir::new();
        let scratch = ScratchArea::new(temp.path().join("scratch"));
        for duration in [0, -1, i64::MIN] {
            let err = plan_capture(&request(duration), "tshark", &limits(), &scratch)
                .await
                .unwrap_err();
            assert!(matches!(err, RequestError::Validation(_)), "{duration}: {err:?}");
        }
        assert!(!scratch.root().exists());
    }

    #[tokio::test]
    async fn empty_interface_is_rejected() {
        let temp = TempDir::new();
        let scratch = ScratchArea::new(temp.path().to_path_buf());
        let request = CaptureRequest {
            interface: " ".to_string(),
            ..request(5)
        };
        let err = plan_capture(&request, "tshark", &limits(), &scratch)
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::validation("interface is required"));
    }

    #[tokio::test]
    async fn missing_output_path_is_allocated_in_scratch() {
        let temp = TempDir::new();
        let scratch = ScratchArea::new(temp.path().join("scratch"));

        let first = plan_capture(&request(2), "tshark", &limits(), &scratch)
            .await
            .expect("plan");
        let second = plan_capture(&request(2), "tshark", &limits(), &scratch)
            .await
            .expect("plan");

        assert_eq!(first.output_file.parent(), Some(scratch.root()));
        assert_ne!(first.output_file, second.output_file);
        assert_eq!(
            first.invocation.argv().last().map(String::as_str),
            Some(&*first.output_file.to_string_lossy())
        );
    }

    #[tokio::test]
    async fn existing_destination_policy() {
        let temp = TempDir::new();
        let scratch = ScratchArea::new(temp.path().to_path_buf());
        let full = temp.write("full.pcapng", b"data");
        let empty = temp.write("empty.pcapng", b"");
        let orphan = temp.path().join("missing-dir").join("x.pcapng");

        let with_output = |path: &Path| CaptureRequest {
            output_file: Some(path.to_string_lossy().into_owned()),
            ..request(1)
        };

        let err = plan_capture(&with_output(&full), "tshark", &limits(), &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Resource(_)));
        assert_eq!(std::fs::read(&full).unwrap(), b"data");

        let plan = plan_capture(&with_output(&empty), "tshark", &limits(), &scratch)
            .await
            .expect("empty file is reusable");
        assert_eq!(plan.output_file, empty);

        let err = plan_capture(&with_output(&orphan), "tshark", &limits(), &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Resource(_)));

        let err = plan_capture(&with_output(temp.path()), "tshark", &limits(), &scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Resource(_)));
    }

    #[tokio::test]
    async fn stdout_and_nameless_destinations_are_rejected() {
        let temp = TempDir::new();
        let scratch = ScratchArea::new(temp.path().to_path_buf());

        for output in ["-", "/", ".."] {
            let request = CaptureRequest {
                output_file: Some(output.to_string()),
                ..request(1)
            };
            let err = plan_capture(&request, "tshark", &limits(), &scratch)
                .await
                .unwrap_err();
            assert!(
                matches!(err, RequestError::Validation(ref message) if message.contains("must name a file")),
                "{output}: {err}"
            );
        }
    }
}

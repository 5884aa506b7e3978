use crate::prompts;
use anyhow::Context;
use capture_engine::Engine;
use futures_util::{SinkExt, StreamExt};
use protocol::control::{ToolRequest, ToolResponse};
use protocol::framing::MAX_LINE_LENGTH;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub(crate) async fn serve(
    listener: TcpListener,
    engine: Arc<Engine>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let connections = TaskTracker::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(open = connections.len(), "sharkd shutting down");
                break;
            }
            accept = listener.accept() => {
                let (stream, peer) = accept.context("failed to accept connection")?;
                let engine = Arc::clone(&engine);
                let shutdown = shutdown.clone();
                connections.spawn(async move {
                    if let Err(err) = handle_connection(stream, peer, engine, shutdown).await {
                        tracing::warn!(peer = %peer, error = %err, "failed to handle connection");
                    }
                });
            }
        }
    }
    // In-flight operations drop their processes on cancellation; wait until
    // every connection has done so.
    connections.close();
    connections.wait().await;
    Ok(())
}

/// One JSON request per line, one JSON response per line. Requests on the
/// same connection are served in order; separate connections run in
/// parallel. Shutdown abandons a pending request without answering it.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<Engine>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    tracing::debug!(peer = %peer, "client connected");
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = framed.next() => next,
        };
        let line = match next {
            None => break,
            Some(Ok(line)) => line,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                send(&mut framed, &error_response("request line too long")).await?;
                continue;
            }
            Some(Err(err)) => return Err(err).context("failed to read request line"),
        };
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => {
                let op = request.name();
                tracing::info!(peer = %peer, op, "request received");
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::warn!(peer = %peer, op, "request cancelled by shutdown");
                        break;
                    }
                    response = dispatch(&engine, request) => response,
                }
            }
            Err(err) => error_response(format!("invalid request: {err}")),
        };
        send(&mut framed, &response).await?;
    }
    tracing::debug!(peer = %peer, "client disconnected");
    Ok(())
}

async fn send(
    framed: &mut Framed<TcpStream, LinesCodec>,
    response: &ToolResponse,
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(response)?;
    framed
        .send(payload)
        .await
        .context("failed to write response")?;
    Ok(())
}

fn error_response(message: impl Into<String>) -> ToolResponse {
    ToolResponse::Error {
        message: message.into(),
    }
}

pub(crate) async fn dispatch(engine: &Engine, request: ToolRequest) -> ToolResponse {
    match request {
        ToolRequest::CheckInstallation => ToolResponse::Installation {
            installed: engine.check_installation().await.installed,
        },
        ToolRequest::ListInterfaces => ToolResponse::Interfaces {
            interfaces: engine.list_interfaces().await,
        },
        ToolRequest::CapturePackets(request) => {
            ToolResponse::Operation(engine.capture_packets(&request).await)
        }
        ToolRequest::ReadCapture(request) => {
            ToolResponse::Operation(engine.read_capture(&request).await)
        }
        ToolRequest::Analyze(request) => ToolResponse::Operation(engine.analyze(&request).await),
        ToolRequest::HealthCheck => ToolResponse::Health(engine.health_check().await),
        ToolRequest::ListPrompts => ToolResponse::Prompts {
            prompts: prompts::list_prompts(),
        },
        ToolRequest::GetPrompt { prompt_id } => match prompts::get_prompt(&prompt_id) {
            Some(prompt) => ToolResponse::Prompt {
                success: true,
                prompt: Some(prompt),
                error: None,
            },
            None => ToolResponse::Prompt {
                success: false,
                prompt: None,
                error: Some(format!("no prompt with id '{prompt_id}'")),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_engine::config::{CaptureConfig, EngineConfig, ToolchainConfig};
    use protocol::{AnalysisRequest, CaptureRequest, HealthStatus};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn missing_toolchain() -> Engine {
        Engine::new(EngineConfig {
            toolchain: ToolchainConfig {
                program: "/nonexistent/sharkd-test/tshark".to_string(),
            },
            ..EngineConfig::default()
        })
    }

    #[tokio::test]
    async fn missing_toolchain_degrades_to_structured_results() {
        let engine = missing_toolchain();

        let response = dispatch(&engine, ToolRequest::CheckInstallation).await;
        assert_eq!(response, ToolResponse::Installation { installed: false });

        let response = dispatch(&engine, ToolRequest::ListInterfaces).await;
        assert_eq!(response, ToolResponse::Interfaces { interfaces: vec![] });

        match dispatch(&engine, ToolRequest::HealthCheck).await {
            ToolResponse::Health(report) => {
                assert_eq!(report.status, HealthStatus::Error);
                assert!(!report.toolchain_installed);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_requests_come_back_as_operations() {
        let engine = missing_toolchain();

        let capture = ToolRequest::CapturePackets(CaptureRequest {
            interface: "1".to_string(),
            duration: 0,
            filter: None,
            output_file: None,
        });
        match dispatch(&engine, capture).await {
            ToolResponse::Operation(response) => {
                assert!(!response.success);
                assert!(response.stderr.starts_with("validation: duration"));
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let analyze = ToolRequest::Analyze(AnalysisRequest {
            file_path: "sample.pcap".to_string(),
            analysis_type: "voip".to_string(),
        });
        match dispatch(&engine, analyze).await {
            ToolResponse::Operation(response) => {
                assert!(!response.success);
                assert!(response.stderr.contains("unsupported analysis type"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn prompt_lookup() {
        let engine = missing_toolchain();
        match dispatch(&engine, ToolRequest::ListPrompts).await {
            ToolResponse::Prompts { prompts } => assert_eq!(prompts.len(), 3),
            other => panic!("unexpected response: {other:?}"),
        }
        let response = dispatch(
            &engine,
            ToolRequest::GetPrompt {
                prompt_id: "nope".to_string(),
            },
        )
        .await;
        assert_eq!(
            response,
            ToolResponse::Prompt {
                success: false,
                prompt: None,
                error: Some("no prompt with id 'nope'".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn serves_json_lines_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(
            listener,
            Arc::new(missing_toolchain()),
            shutdown.clone(),
        ));

        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half
            .write_all(b"{\"op\":\"check_installation\"}\nnot json\n")
            .await
            .expect("write");

        let first = lines.next_line().await.expect("read").expect("line");
        let first: ToolResponse = serde_json::from_str(&first).expect("decode");
        assert_eq!(first, ToolResponse::Installation { installed: false });

        let second = lines.next_line().await.expect("read").expect("line");
        let second: ToolResponse = serde_json::from_str(&second).expect("decode");
        assert!(matches!(
            second,
            ToolResponse::Error { ref message } if message.starts_with("invalid request")
        ));

        shutdown.cancel();
        server.await.expect("join").expect("serve");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn shutdown_cancels_in_flight_capture() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = std::env::temp_dir().join(format!("shark-daemon-shutdown-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let pid_file = dir.join("capture.pid");
        let program = dir.join("tshark");
        let script = format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 34\n", pid_file.display());
        std::fs::write(&program, script).expect("write script");
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let engine = Engine::new(EngineConfig {
            toolchain: ToolchainConfig {
                program: program.to_string_lossy().into_owned(),
            },
            capture: CaptureConfig {
                scratch_dir: dir.join("scratch").to_string_lossy().into_owned(),
            },
            ..EngineConfig::default()
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, Arc::new(engine), shutdown.clone()));

        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        write_half
            .write_all(b"{\"op\":\"capture_packets\",\"interface\":\"eth0\",\"duration\":30}\n")
            .await
            .expect("write");

        let mut pid = String::new();
        for _ in 0..50 {
            if let Ok(contents) = std::fs::read_to_string(&pid_file) {
                if !contents.trim().is_empty() {
                    pid = contents.trim().to_string();
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!pid.is_empty(), "capture never started");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("serve did not drain connections")
            .expect("join")
            .expect("serve");
        assert_eq!(lines.next_line().await.expect("read"), None);

        let stat = format!("/proc/{pid}/stat");
        let mut alive = true;
        for _ in 0..30 {
            alive = std::fs::read_to_string(&stat)
                .map(|stat| {
                    stat.rsplit_once(')')
                        .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z'))
                })
                .unwrap_or(false);
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let _ = std::fs::remove_dir_all(&dir);
        assert!(!alive, "capture process {pid} outlived shutdown");
    }
}

mod cli;
mod logging;
mod prompts;
mod server;

use crate::cli::Args;
use crate::logging::init_tracing;
use anyhow::Context;
use capture_engine::config::EngineConfig;
use capture_engine::Engine;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_deref(), args.log_to_stderr)?;

    let mut config = match args.config.as_ref() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(program) = args.program.clone() {
        config.toolchain.program = program;
    }
    if let Some(scratch_dir) = args.scratch_dir.clone() {
        config.capture.scratch_dir = scratch_dir;
    }
    let engine = Arc::new(Engine::new(config));
    preflight(&engine).await;

    let listener = TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    tracing::info!(addr = %args.listen_addr, "sharkd listening");

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());
    server::serve(listener, engine, shutdown).await
}

/// Reports toolchain state at startup. A missing toolchain or scratch
/// directory only degrades the affected operations, so nothing here aborts.
async fn preflight(engine: &Engine) {
    if !engine.check_installation().await.installed {
        tracing::error!(
            program = %engine.program(),
            "toolchain is not installed or not invokable; operations will report failures"
        );
    } else {
        let interfaces = engine.list_interfaces().await;
        tracing::info!(count = interfaces.len(), "detected capture interfaces");
        for interface in &interfaces {
            tracing::info!(index = %interface.index, interface = %interface.interface, "interface");
        }
    }
    if let Err(err) = engine.prepare_scratch().await {
        tracing::warn!(error = %err, "scratch directory unavailable");
    }
}

fn spawn_shutdown_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });
}

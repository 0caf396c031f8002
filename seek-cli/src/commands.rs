use anyhow::{Context, Result};
use seek_common::ExecuteRequest;
use seek_gateway::{normalize, GatewayState, HistoryStore};
use seek_sandbox::{ExecutionService, ProfileRegistry, ServiceConfig};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "seek_execd={},seek_gateway={},seek_sandbox={}",
                    log_level, log_level, log_level
                ))
            }),
        )
        .init();
}

/// Run the HTTP gateway until SIGINT/SIGTERM.
pub async fn serve(host: &str, port: u16, verbose: bool) -> Result<()> {
    init_tracing(verbose);

    let config = ServiceConfig::from_env();
    info!(
        max_concurrency = config.max_concurrency,
        max_queue_depth = config.max_queue_depth,
        scratch_root = %config.scratch_root.display(),
        "starting execution service"
    );

    let history = Arc::new(HistoryStore::with_capacity(config.history_capacity));
    let service = ExecutionService::new(config, history.clone())
        .context("failed to initialize execution service")?;
    let state = GatewayState::new(service, history);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    seek_gateway::start_server(listener, state, shutdown).await
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("cannot install SIGTERM handler: {e}");
                    let _ = ctrl_c.await;
                    shutdown.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown signal received, draining");
        shutdown.cancel();
    });
}

/// Execute one local file through the same pipeline the gateway uses.
pub async fn run_once(
    file: &Path,
    language: &str,
    stdin: Option<String>,
    verbose: bool,
) -> Result<()> {
    init_tracing(verbose);

    let code = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let request = ExecuteRequest {
        code,
        language: language.to_string(),
        input: stdin.unwrap_or_default(),
    };

    let service = ExecutionService::detached(ServiceConfig::from_env())?;
    let report = service
        .execute(&request, &CancellationToken::new())
        .await
        .context("execution failed")?;

    let response = normalize(&report);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !report.result.success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the ids the registry answers to.
pub fn languages() -> Result<()> {
    for id in ProfileRegistry::builtin().ids() {
        println!("{id}");
    }
    Ok(())
}

pub mod tracing;

use crate::config;
use crate::crash::{install_panic_hook, spawn_supervised};
use crate::domain::Metadata;
use crate::logger::Logger;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

/// Application entry point. Builds the pipeline from the environment and
/// forwards stdin lines to the access-log stream until EOF or shutdown.
pub async fn run() -> anyhow::Result<()> {
    tracing::init_tracing();

    let settings = config::get_configuration()?;
    let logger = Arc::new(Logger::from_settings(&settings)?);
    install_panic_hook(Arc::clone(&logger));

    logger.info(
        "Logger started",
        Metadata::new()
            .with("environment", settings.environment.as_str())
            .with("level", settings.log_level.as_str()),
    );

    let stream = logger.stream();
    let pump = spawn_supervised(Arc::clone(&logger), "access-log-pump", async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut forwarded = 0u64;
        while let Some(line) = lines.next_line().await? {
            stream.write(&line);
            forwarded += 1;
        }
        Ok::<_, std::io::Error>(forwarded)
    });
    let abort = pump.abort_handle();

    let forwarded = tokio::select! {
        joined = pump => joined.ok().flatten(),
        _ = shutdown_signal() => {
            abort.abort();
            None
        }
    };

    let mut metadata = Metadata::new();
    if let Some(count) = forwarded {
        metadata.insert("forwardedLines", count);
    }
    logger.info("Logger shutting down", metadata);
    logger.flush();
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            ::tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                ::tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => ::tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => ::tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

//! Main entry point for the zipmeta service.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

use zipmeta::logging::init_logging;
use zipmeta::{Cli, Server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_filter());

    let config = cli.server_config();
    if !config.staging_dir.is_dir() {
        tracing::warn!(
            staging_dir = %config.staging_dir.display(),
            "staging directory does not exist; every request will fail"
        );
    }

    let addr = cli.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        staging_dir = %config.staging_dir.display(),
        workers = config.workers,
        "listening"
    );

    let server = Server::new(config);
    axum::serve(listener, server.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

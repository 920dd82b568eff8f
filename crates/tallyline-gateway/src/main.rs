//! tallyline gateway
//!
//! - TCP line ingestion per configured listener (default 127.0.0.1:6873)
//! - Prometheus scrape endpoint (default 0.0.0.0:8080/prometheus)
//! - /healthz, /readyz
//! - Graceful shutdown on Ctrl+C / SIGTERM

use std::process::ExitCode;

use tallyline_core::error::Result;
use tallyline_gateway::{config, runtime};

#[tokio::main]
async fn main() -> ExitCode {
    runtime::init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.kind().as_str(), error = %e, "tallyline-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::var(config::CONFIG_ENV)
        .unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_string());
    let (cfg, from_file) = config::load_or_default(&path)?;
    if from_file {
        tracing::info!(%path, "config loaded");
    } else {
        tracing::info!(%path, "config file not found, using built-in defaults");
    }

    let gateway = runtime::Gateway::start(cfg).await?;
    tracing::info!("tallyline-gateway started");

    runtime::shutdown_signal().await;
    gateway.shutdown().await
}

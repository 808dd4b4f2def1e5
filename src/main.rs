//! cipherscore: Privacy-preserving financial risk scoring.
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cipherscore::adapters::sanitize::SanitizingMakeWriter;
use cipherscore::adapters::tfhe::TfheEngine;
use cipherscore::application::AssessmentService;
use cipherscore::config::{LogTarget, ServerConfig};
use cipherscore::http::{build_router, AppState};
use cipherscore::{RiskModel, SchemeParameters};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;

    // Initialize logging. Every formatted line passes through the sanitizer.
    let (writer, _guard) = match &config.log_target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                // Best-effort: opening the file reports the real error.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {path:?}"))?;
            tracing_appender::non_blocking(file)
        }
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    // tfhe-rs reports bad ciphertexts and keys by panicking; those panics are
    // caught per request, but their messages still go through the sanitizer.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));

    tracing::info!("Starting cipherscore...");

    let model = RiskModel::standard();
    let params = SchemeParameters::standard();
    tracing::info!(
        "Risk model v{}, scheme v{} (FheInt{}, fixed-point 2^{}, depth {})",
        model.version,
        params.version,
        params.integer_bits,
        params.fixed_point_bits,
        params.max_multiplicative_depth
    );

    let service = AssessmentService::new(Arc::new(TfheEngine::new(params)), Arc::new(model))?;
    let app = build_router(AppState::new(service, config.request_timeout), &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.bind_addr))?;
    tracing::info!(
        "Listening on http://{} (origins: {})",
        config.bind_addr,
        config.allowed_origins.join(", ")
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("cipherscore shutdown complete.");
    Ok(())
}

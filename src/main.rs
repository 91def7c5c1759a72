// src/main.rs
use std::process::ExitCode;

use cargo_fitter::api;
use cargo_fitter::config::AppConfig;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();

    info!("🚀 Cargo fitting service starting...");
    match api::start_api_server(app_config.api, app_config.optimizer).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("❌ API server terminated with an error: {err}");
            ExitCode::FAILURE
        }
    }
}

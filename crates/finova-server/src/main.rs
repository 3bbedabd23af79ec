//! finova-server binary

use anyhow::Context as _;
use clap::Parser;
use finova_server::{AppState, app};
use finova_utils::{LogFormat, Settings, init_tracing_with};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "finova-server")]
#[command(about = "Financial statement analysis service", long_about = None)]
struct Args {
    /// Bind address, overrides FINOVA_HOST
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides FINOVA_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Log format (pretty or json), overrides FINOVA_LOG_FORMAT
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::from_env().context("failed to load settings")?;
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(format) = args.log_format {
        settings.log_format = format;
    }

    init_tracing_with(settings.log_format, &settings.log_level);
    info!(?settings, "Starting finova-server");

    let state = AppState::from_settings(&settings)?;
    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

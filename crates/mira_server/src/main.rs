use anyhow::{Context, Result, bail};
use clap::Parser;
use mira_server::{
    AppState, DEFAULT_CONFIG_FILE, DEFAULT_ENV_FILE, ObservabilityConfig, ServiceConfig,
    init_observability, load_env_file, serve,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mira streaming completion service", long_about = None)]
struct Args {
    /// Configuration file (default: ./mira.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind, overriding configuration
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding configuration and PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long, env = "MIRA_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_loaded = load_env_file(DEFAULT_ENV_FILE)?;
    let args = Args::parse();

    init_observability(&ObservabilityConfig {
        log_level: args.log_level.clone(),
        json_logs: args.json_logs,
    })?;
    if env_loaded {
        info!(path = DEFAULT_ENV_FILE, "Loaded environment file");
    }

    let file = match args.config {
        Some(path) if !path.exists() => bail!("configuration file not found: {}", path.display()),
        Some(path) => path,
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };
    let config = ServiceConfig::from_sources(Some(&file), std::env::vars().collect())?
        .with_bind(args.host, args.port);
    config.validate()?;

    info!(
        version = %config.version(),
        model = %config.response_model(),
        timeout_secs = config.request_timeout_secs(),
        router = ?config.router_base_url(),
        "Starting Mira completion service"
    );

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    let grace = config.shutdown_grace();
    serve(listener, AppState::new(config), shutdown_signal(), grace).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

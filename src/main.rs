use clap::Parser;
use pulso::adapter::{ConnectionHandler, ConnectionManager, LocalAdapter};
use pulso::app::factory::AppManagerFactory;
use pulso::http_handler;
use pulso::options::ServerOptions;
use pulso::protocol::constants::close_codes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pulso", version, about = "A Pusher-protocol-compatible WebSocket server")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured listen host.
    #[arg(long)]
    host: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut options = if args.config.exists() {
        ServerOptions::load_from_file(&args.config)?
    } else {
        info!(
            "no configuration at {}, starting with defaults",
            args.config.display()
        );
        ServerOptions::default()
    };
    if let Some(port) = args.port {
        options.port = port;
    }
    if let Some(host) = args.host {
        options.host = host;
    }

    let app_manager = AppManagerFactory::create(&options.app_manager).await?;
    let connection_manager: Arc<Mutex<dyn ConnectionManager + Send + Sync>> =
        Arc::new(Mutex::new(LocalAdapter::new()));
    let handler = Arc::new(ConnectionHandler::new(app_manager, connection_manager));

    let router = http_handler::router(handler.clone());
    let listener = tokio::net::TcpListener::bind(options.address()).await?;
    info!("listening on {}", options.address());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(
            handler,
            options.shutdown_grace_period,
        ))
        .await?;

    info!("shutdown complete, goodbye");
    Ok(())
}

/// Resolves on SIGINT/SIGTERM, then closes every open session within the
/// grace window so axum's graceful shutdown can drain.
async fn shutdown_signal(handler: Arc<ConnectionHandler>, grace_period: u64) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(
        "shutdown sequence initiated, graceful timeout: {}s",
        grace_period
    );

    let drain = handler.close_all_connections(
        close_codes::GENERIC_RECONNECT_IMMEDIATELY,
        "Server is shutting down",
    );
    if tokio::time::timeout(Duration::from_secs(grace_period), drain)
        .await
        .is_err()
    {
        warn!("graceful shutdown timed out, dropping remaining sessions");
    }
}

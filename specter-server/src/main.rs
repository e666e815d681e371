use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use specter_server::{AppState, Config, create_app, results::reaper};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "specter-server")]
#[command(about = "Username-enumeration OSINT web API streaming live sherlock scans over SSE")]
struct Cli {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(host) = cli.host {
        config.server_host = host;
    }

    let default_filter = format!("{},tower_http=warn", config.log_level.to_lowercase());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config
        .ensure_directories()
        .context("failed to create result directories")?;

    info!(
        results_dir = %config.results_dir.display(),
        max_concurrent = config.max_concurrent_searches,
        timeout_secs = config.search_timeout.as_secs(),
        "search configuration in effect"
    );

    let state = AppState::new(config);
    match &state.sherlock {
        Some(tool) => info!(path = %tool.path().display(), "sherlock found"),
        None => warn!(
            "sherlock executable NOT found; set SHERLOCK_PATH or install sherlock-project"
        ),
    }

    let shutdown = CancellationToken::new();
    let reaper_handle = reaper::spawn(
        state.store.clone(),
        state.config.cleanup_interval,
        state.config.cleanup_age,
        shutdown.clone(),
    );

    let app = create_app(state.clone());
    let addr = format!(
        "{}:{}",
        state.config.server_host, state.config.server_port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    shutdown.cancel();
    if let Err(err) = reaper_handle.await {
        warn!("reaper task did not shut down cleanly: {err}");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to install ctrl-c handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

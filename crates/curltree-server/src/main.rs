use anyhow::{Context, Result};
use clap::Parser;
use curltree_core::config::{Config, LogFormat, LogOutput, LoggingConfig};
use curltree_server::{router, AppState};
use curltree_storage::{ProfileStore, SqliteProfileStore};
use std::{
    fs::OpenOptions,
    io,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::info;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "curltree-server", about = "Serve curltree profiles over HTTP")]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config.logging)?;

    let store: Arc<dyn ProfileStore> = Arc::new(
        SqliteProfileStore::open(&config.database.path).with_context(|| {
            format!("failed to open database {}", config.database.path.display())
        })?,
    );
    let state = AppState::new(store, &config.server);
    let _cleanup = state.limiter().start_cleanup(Duration::from_secs(
        config.server.rate_limit.cleanup_interval_secs,
    ));
    let app = router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        event = "server_start",
        addr = %addr,
        public_host = %config.server.public_host,
        database = %config.database.path.display()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!(event = "server_stop");
    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (writer, ansi) = match config.output {
        LogOutput::Stdout => (BoxMakeWriter::new(io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(io::stderr), true),
        LogOutput::File => {
            let path = config
                .output_file
                .as_ref()
                .context("logging.output_file is required for file output")?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);
    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(event = "shutdown_signal", signal = "ctrl_c"),
        _ = terminate => info!(event = "shutdown_signal", signal = "terminate"),
    }
}

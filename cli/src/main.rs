//! Periscope CLI - binary entry point.
//!
//! Wires a diagnostics host to the session server and serves the MCP channel
//! over HTTP. With `--snapshot` the host is a polled JSON export; without it
//! an empty in-memory host is served, which is useful for probing the
//! protocol surface or embedding the server behind another producer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use periscope_diagnostics::{DiagnosticsHost, InMemoryHost, SnapshotFileHost};
use periscope_server::{PeriscopeConfig, ServerInfo, SessionServer, router};

#[derive(Debug, Parser)]
#[command(name = "periscope", version, about = "Serve live workspace diagnostics over MCP")]
struct Args {
    /// Path to the configuration file (default: periscope.toml, overridable
    /// via PERISCOPE_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen port from the configuration.
    #[arg(long)]
    port: Option<u16>,

    /// Serve diagnostics from a JSON snapshot export, re-reading it on
    /// change.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("PERISCOPE_LOG")
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    // Logs go to stderr; stdout stays clean for callers that pipe it.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PeriscopeConfig::load_from(path)?,
        None => PeriscopeConfig::load()?,
    };
    let server_config = config.server();
    let port = args.port.unwrap_or(server_config.port);

    let host: Arc<dyn DiagnosticsHost> = match args.snapshot {
        Some(path) => {
            let poll_interval = Duration::from_secs(config.host().poll_interval_secs);
            Arc::new(
                SnapshotFileHost::open(path, poll_interval)
                    .await
                    .context("opening diagnostics snapshot")?,
            )
        }
        None => {
            tracing::info!("no snapshot file given, serving an empty diagnostics host");
            Arc::new(InMemoryHost::new())
        }
    };

    let session = SessionServer::spawn(host, ServerInfo::default());
    let app = router(session, Duration::from_secs(server_config.keep_alive_secs));

    let addr = format!("{}:{port}", server_config.bind);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("MCP server listening on http://{addr}/mcp");
    tracing::info!("health probe on http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        return;
    }
    tracing::info!("shutting down");
}

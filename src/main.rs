//! HTTP API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http server ──▶ route table ──▶ auth strategy ──▶ forward ──▶ Backend
//!                    (request id,    (longest        (registry         (rewrite,
//!                     timeout)        prefix)         lookup)           X-Forwarded-*)
//!     Client Response
//!     ◀───────────── status recorder ◀── transaction log ◀────────────────────────── Backend
//! ```
//!
//! Startup order: config, logging, auth registry, route table, listener.
//! Shutdown: stop accepting, drain for `timeouts.shutdown_secs`, then
//! cancel what is left.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, locate_config, DEFAULT_CONFIG_FILE};
use api_gateway::http::{GatewayHandler, HttpServer, ReqwestTransport, RoutingState};
use api_gateway::lifecycle::{wait_for_signal, Shutdown};
use api_gateway::observability::{init_logging, metrics, TracingSink};

/// Grace period for the server task after forced cancellation.
const FORCE_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "HTTP API gateway with prefix routing and JWT auth", long_about = None)]
struct Args {
    /// Config file (YAML or TOML). Searched under config/ when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let path = locate_config(args.config.as_deref(), DEFAULT_CONFIG_FILE)?;
    let config = load_config(&path)?;

    init_logging(&config.observability);
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %path.display(),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        backend_timeout_secs = config.timeouts.backend_secs,
        "Configuration loaded"
    );

    let state = match RoutingState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Invalid routing configuration");
            return Err(e.into());
        }
    };
    for route in state.table().routes() {
        tracing::info!(
            prefix = route.prefix(),
            target = route.target(),
            auth = route.auth_type().unwrap_or("none"),
            "Route registered"
        );
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let transport = ReqwestTransport::new(&config)?;
    let handler = Arc::new(GatewayHandler::new(state, transport, Arc::new(TracingSink)));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let drain = Duration::from_secs(config.timeouts.shutdown_secs);
    let server = HttpServer::new(config, handler, &shutdown);
    let mut serving = tokio::spawn(server.run(listener, shutdown.clone()));

    tokio::select! {
        result = &mut serving => {
            // Server stopped on its own: surface the error.
            result??;
            return Ok(());
        }
        _ = wait_for_signal() => {}
    }

    tracing::info!(drain_secs = drain.as_secs(), "Stopping, draining in-flight requests");
    shutdown.trigger();

    match tokio::time::timeout(drain, &mut serving).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!("Forced shutdown");
            shutdown.force();
            if tokio::time::timeout(FORCE_GRACE, &mut serving).await.is_err() {
                tracing::warn!("Server did not stop after forced cancellation");
                serving.abort();
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Ruster Trace API Server
//!
//! Usage:
//!   cargo run --bin ruster_trace_api
//!
//! Environment:
//!   PORT / RUSTER_PORT - Server port (default: 8080)
//!   RUSTER_HOST        - Server host (default: 0.0.0.0)
//!   RUST_LOG           - Log level (default: info)
//!   ETHERSCAN_API_KEY, BSCSCAN_API_KEY, RUSTER_TRACE_CHAINS, DEXSCREENER_BASE

use ruster_trace::api::{create_router, AppState};
use ruster_trace::utils::telemetry::init_logging;
use ruster_trace::TracerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_logging("info");

    let config = TracerConfig::from_env();
    let state = AppState::from_config(config).map_err(|e| eyre::eyre!("{}", e))?;
    if state.tracer.resolver().resolve(None, None).is_none() {
        warn!("⚠️ Default chain has no explorer API key; trace requests will fail");
    }

    let app = create_router(Arc::new(state));

    // PORT (platform-assigned) wins over RUSTER_PORT
    let host = std::env::var("RUSTER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("RUSTER_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 Ruster Trace API starting on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /v1/trace/wallet - Multi-hop wallet trace + risk report");
    info!("  POST /v1/risk/token   - DEX pair + contract risk assessment");
    info!("  GET  /v1/health       - Health check");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("⚠️ Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("👋 Ruster Trace API shutdown complete");
    Ok(())
}

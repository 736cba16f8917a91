//! Matchbook - Peer-to-Peer Wager Settlement Service
//!
//! Wires the ledger store, escrow and oracle adapters into the engine,
//! spawns the periodic settlement scan, and serves the API.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchbook_backend::{
    adapters::{EscrowAdapter, HttpOracleAdapter, OracleAdapter, PaperEscrowAdapter, StaticOracleAdapter},
    api,
    engine::{settlement_loop, EngineConfig, WagerEngine},
    models::Config,
    store::Store,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Matchbook wager engine starting");

    let store = Store::new(&config.database_path)?;
    info!("Database initialized at: {}", config.database_path);

    // Adapter handles are constructed here and injected; the engine holds
    // no global mutable state.
    let escrow: Arc<dyn EscrowAdapter> = Arc::new(PaperEscrowAdapter::new());
    let oracle: Arc<dyn OracleAdapter> = match &config.oracle_base_url {
        Some(base_url) => {
            info!("Results oracle at: {}", base_url);
            Arc::new(HttpOracleAdapter::new(
                base_url,
                Duration::from_secs(config.adapter_timeout_secs),
            )?)
        }
        None => {
            warn!("ORACLE_BASE_URL not configured - static oracle active, nothing will settle");
            Arc::new(StaticOracleAdapter::new())
        }
    };

    let engine = Arc::new(WagerEngine::new(
        store,
        escrow,
        oracle,
        EngineConfig::from_config(&config),
    ));

    // Periodic settlement scan; safe to overlap with itself.
    tokio::spawn(settlement_loop(engine.clone(), config.settlement_scan_secs));

    let app = api::create_router(engine).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchbook_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;

mod analytics;
mod api;
mod config;
mod database;
mod deposit_manager;
mod deposit_tracker;
mod errors;
mod models;
mod transaction_builder;
mod websocket;

#[cfg(test)]
mod tests;

use api::handlers::AppState;
use config::Config;
use database::DatabaseManager;
use deposit_manager::DepositManager;
use deposit_tracker::DepositTracker;
use transaction_builder::TransactionBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Timelock Wallet Service");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    log::info!("Configuration loaded");
    log::info!("MongoDB URI: {}", config.mongodb.uri);
    log::info!("Solana RPC: {}", config.solana.rpc_url);
    log::info!("Program ID: {}", config.program.program_id);

    // Initialize database
    let db = Arc::new(DatabaseManager::new(&config.mongodb).await?);
    log::info!("Database connection established");

    // Initialize Solana RPC client
    let commitment = CommitmentConfig::from_str(&config.solana.commitment)?;
    let rpc_client = Arc::new(RpcClient::new_with_commitment(
        config.solana.rpc_url.clone(),
        commitment,
    ));
    log::info!("Solana RPC client initialized");

    let ws_sender = websocket::channel();

    let deposits = Arc::new(DepositManager::new(&config, Arc::clone(&rpc_client))?);
    let transaction_builder = Arc::new(TransactionBuilder::new(
        Arc::clone(&rpc_client),
        *deposits.program_id(),
    ));
    log::info!("Deposit manager initialized");

    // Start deposit indexing
    let tracker = DepositTracker::new(
        Arc::clone(&db),
        Arc::clone(&deposits),
        ws_sender.clone(),
        Duration::from_secs(config.tracker.sync_interval_secs),
    );
    tracker.start_monitoring();
    log::info!("Deposit tracking started");

    // Start periodic analytics snapshots
    let stats_tracker = tracker.clone();
    let stats_interval = Duration::from_secs(config.tracker.stats_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(stats_interval);
        loop {
            interval.tick().await;
            if let Err(e) = stats_tracker.update_stats().await {
                log::error!("Failed to update stats: {}", e);
            }
        }
    });

    // Create application state
    let app_state = Arc::new(AppState {
        deposits,
        transaction_builder,
        db,
        ws_sender,
    });

    let app = api::create_router(app_state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use crate::api::handlers::AppState;
use crate::websocket;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod handlers;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Deposits
        .route("/deposits/derive", get(handlers::derive_addresses))
        .route("/deposits/owner/:owner", get(handlers::get_deposits_by_owner))
        .route("/deposits/:address", get(handlers::get_deposit))
        // Unsigned transactions for wallets
        .route("/transactions/prepare", post(handlers::prepare_transaction))
        // Analytics
        .route("/analytics", get(handlers::get_analytics))
        .route("/analytics/:owner", get(handlers::get_owner_analytics))
        // Live feed
        .route("/ws", get(websocket::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

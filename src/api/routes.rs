//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket for pushed state changes
        .route("/ws", get(ws_handler))
        // Contract
        .route("/api/contract", get(handlers::get_contract))
        .route("/api/snapshot", get(handlers::get_snapshot))
        // Fields
        .route("/api/fields/{field}", get(handlers::get_field))
        .route("/api/fields/{field}/read", post(handlers::read_field))
        // Mutations
        .route("/api/operations/{name}", post(handlers::mutate))
        .with_state(state)
        .layer(cors)
}

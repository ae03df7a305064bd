use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::rooms::presence;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the axum Router with all routes and middleware.
///
/// CORS is wide open: the browser client is served from a separate origin
/// and this server carries no credentials.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/api/rooms", get(presence::list_rooms))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

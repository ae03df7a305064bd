use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. There is no authentication: anyone supplying
/// a display name may join any room. The server mints a fresh endpoint id per
/// connection; it doubles as the relay address and the participant identity.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let endpoint_id = uuid::Uuid::new_v4().to_string();

    tracing::info!(endpoint_id = %endpoint_id, "WebSocket connection accepted");

    ws.on_upgrade(move |socket| actor::run_connection(socket, state, endpoint_id))
}

use std::sync::Arc;

use crate::rooms::registry::RoomRegistry;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Active WebSocket connections by endpoint id
    pub connections: ConnectionRegistry,
    /// Authoritative room membership table
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            connections: crate::ws::new_connection_registry(),
            rooms: Arc::new(RoomRegistry::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

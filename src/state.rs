use std::sync::Arc;

use crate::presence::RoomRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(registry: RoomRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

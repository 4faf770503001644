pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod presence;
pub mod security;
pub mod state;
pub mod video;
pub mod ws;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;

/// Full application router: REST API, health and WebSocket endpoint
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(api::create_router(state.clone()))
        .merge(ws::ws_routes().with_state(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

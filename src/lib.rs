pub mod config;
pub mod core;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{Router, middleware::from_fn_with_state};

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::*;
pub use state::AppState;

/// Assemble every route with its middleware.
///
/// Layer order on the media route (outer to inner):
/// connection_limit -> handler
pub fn build_router(state: Arc<AppState>) -> Router {
    let media_routes = routes::media::create_media_router().layer(from_fn_with_state(
        state.clone(),
        middleware::connection_limit_middleware,
    ));

    routes::api::create_api_router()
        .merge(media_routes)
        .with_state(state)
}

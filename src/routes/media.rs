//! Media stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream router
///
/// # Endpoint
///
/// `GET /media` - WebSocket upgrade for one call leg
///
/// # Protocol
///
/// The telephony provider sends JSON text frames: `connected`, `start`,
/// `media` (base64 audio), `mark` and `stop`. The bridge answers with
/// `media` frames carrying the assistant's audio and a `mark` named `done`
/// after each response.
///
/// Capacity is enforced by the connection limit middleware, applied in
/// [`crate::build_router`].
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media", get(media_handler))
        .layer(TraceLayer::new_for_http())
}

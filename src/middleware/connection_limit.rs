//! Call capacity middleware for the media stream endpoint
//!
//! Reserves a slot in the [`BridgeRegistry`](crate::core::bridge::BridgeRegistry)
//! before the WebSocket upgrade so a caller over the limit is refused with
//! 503 instead of being accepted and then dropped.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use callbridge::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media", get(media_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::{Arc, Mutex};

use crate::core::bridge::CallPermit;
use crate::state::AppState;

/// Extension carrying the reserved slot to the handler.
///
/// If the request never reaches the handler the extension is dropped with
/// it and the slot is released.
#[derive(Clone, Debug)]
pub struct ReservedCall(Arc<Mutex<Option<CallPermit>>>);

impl ReservedCall {
    pub fn new(permit: CallPermit) -> Self {
        Self(Arc::new(Mutex::new(Some(permit))))
    }

    /// Take the permit; later calls return `None`.
    pub fn take(&self) -> Option<CallPermit> {
        match self.0.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Middleware that enforces the maximum number of concurrent calls.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) are
/// counted; other requests pass through untouched.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.registry.try_reserve() {
        Ok(permit) => {
            request.extensions_mut().insert(ReservedCall::new(permit));
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                active_calls = state.registry.active_calls(),
                "Rejecting media stream: {}",
                e
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bridge::BridgeRegistry;

    #[test]
    fn test_reserved_call_take_once() {
        let registry = Arc::new(BridgeRegistry::new(Some(1)));
        let reserved = ReservedCall::new(registry.try_reserve().unwrap());
        let clone = reserved.clone();

        let permit = clone.take().unwrap();
        assert!(reserved.take().is_none());
        assert_eq!(registry.active_calls(), 1);

        drop(permit);
        assert_eq!(registry.active_calls(), 0);
    }

    #[test]
    fn test_dropped_extension_releases_slot() {
        let registry = Arc::new(BridgeRegistry::new(Some(1)));
        let reserved = ReservedCall::new(registry.try_reserve().unwrap());
        assert!(registry.try_reserve().is_err());
        drop(reserved);
        assert!(registry.try_reserve().is_ok());
    }
}

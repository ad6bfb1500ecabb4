//! Media stream WebSocket handler
//!
//! Each accepted connection is one call leg. The handler wraps the socket
//! in a [`SinkLeg`] and an inbound stream and hands both to a new
//! [`SessionBridge`], which runs until the call ends.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::bridge::{CallPermit, SessionBridge, SinkLeg, inbound_stream};
use crate::middleware::ReservedCall;
use crate::state::AppState;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Media stream WebSocket handler
///
/// Uses the call slot reserved by the connection limit middleware when
/// present, otherwise reserves one here.
pub async fn media_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    reserved: Option<Extension<ReservedCall>>,
) -> Response {
    let permit = match reserved.and_then(|Extension(reserved)| reserved.take()) {
        Some(permit) => permit,
        None => match state.registry.try_reserve() {
            Ok(permit) => permit,
            Err(e) => {
                warn!(error = %e, "Rejecting media stream");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Server at capacity. Please try again later.",
                )
                    .into_response();
            }
        },
    };

    info!(call_id = %permit.id(), "Media stream upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state, permit))
}

/// Run one call from upgrade to teardown
async fn handle_media_socket(socket: WebSocket, state: Arc<AppState>, permit: CallPermit) {
    let (sender, receiver) = socket.split();
    let call_leg = SinkLeg::<_, Message>::new(sender);

    let bridge = SessionBridge::new(permit.id(), state.bridge_config.clone(), Box::new(call_leg))
        .with_permit(permit);
    let session = bridge
        .run(inbound_stream(receiver), Arc::clone(&state.dialer))
        .await;

    info!(
        call_id = %session.id,
        stream_sid = session.stream_sid.as_deref().unwrap_or_default(),
        "Media stream finished"
    );
}

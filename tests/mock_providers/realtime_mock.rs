//! WebSocket Mock Server for the OpenAI Realtime API
//!
//! Accepts the bridge's AI leg, records every client event and answers each
//! `response.create` with audio deltas followed by `response.done`.

use super::MockStats;
use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How the mock behaves
#[derive(Clone, Debug)]
pub struct RealtimeMockConfig {
    /// Refuse every handshake with this HTTP status
    pub reject_status: Option<u16>,
    /// Close the socket right after `session.created`
    pub drop_after_created: bool,
    /// Raw bytes carried by each audio delta
    pub response_audio: Vec<u8>,
    pub deltas_per_response: usize,
}

impl Default for RealtimeMockConfig {
    fn default() -> Self {
        Self {
            reject_status: None,
            drop_after_created: false,
            // 20ms of PCM16 silence at 24kHz
            response_audio: vec![0u8; 960],
            deltas_per_response: 2,
        }
    }
}

/// Shared state of a running mock
#[derive(Default)]
pub struct RealtimeMockState {
    pub stats: MockStats,
    pub received: Mutex<Vec<Value>>,
    pub authorization: Mutex<Vec<String>>,
}

pub struct RealtimeMock {
    pub addr: SocketAddr,
    pub state: Arc<RealtimeMockState>,
    handle: JoinHandle<()>,
}

impl RealtimeMock {
    pub async fn start(config: RealtimeMockConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(RealtimeMockState::default());

        let server_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&server_state);
                let config = config.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, state, config).await;
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Endpoint to configure as `OPENAI_REALTIME_URL`
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// `type` of every client event received, in order
    pub fn received_types(&self) -> Vec<String> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().unwrap().clone()
    }

    /// Poll until `condition` holds on the received event types
    pub async fn wait_for(&self, timeout: Duration, condition: impl Fn(&[String]) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if condition(&self.received_types()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition(&self.received_types())
    }
}

impl Drop for RealtimeMock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<RealtimeMockState>,
    config: RealtimeMockConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let reject_status = config.reject_status;
    let header_state = Arc::clone(&state);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if let Some(auth) = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        {
            header_state
                .authorization
                .lock()
                .unwrap()
                .push(auth.to_string());
        }
        match reject_status {
            Some(status) => Err(http::Response::builder()
                .status(status)
                .body(Some("refused".to_string()))
                .unwrap()),
            None => Ok(response),
        }
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            state.stats.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(e.into());
        }
    };
    state.stats.connections.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = ws_stream.split();

    let created = json!({
        "type": "session.created",
        "event_id": "event_1",
        "session": {"id": "sess_mock", "model": "gpt-4o-realtime-preview"}
    });
    write.send(Message::Text(created.to_string().into())).await?;

    if config.drop_after_created {
        write.send(Message::Close(None)).await?;
        return Ok(());
    }

    let mut response_count = 0u64;
    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => {
                let event: Value = serde_json::from_str(text.as_str())?;
                let event_type = event["type"].as_str().unwrap_or_default().to_string();
                state.received.lock().unwrap().push(event);

                match event_type.as_str() {
                    "session.update" => {
                        let updated =
                            json!({"type": "session.updated", "session": {"id": "sess_mock"}});
                        write.send(Message::Text(updated.to_string().into())).await?;
                    }
                    "response.create" => {
                        response_count += 1;
                        let response_id = format!("resp_{response_count}");
                        for _ in 0..config.deltas_per_response {
                            let delta = json!({
                                "type": "response.audio.delta",
                                "response_id": response_id,
                                "delta": BASE64_STANDARD.encode(&config.response_audio)
                            });
                            write.send(Message::Text(delta.to_string().into())).await?;
                        }
                        let done = json!({
                            "type": "response.done",
                            "response": {"id": response_id, "status": "completed"}
                        });
                        write.send(Message::Text(done.to_string().into())).await?;
                        state.stats.responses_sent.fetch_add(1, Ordering::SeqCst);
                    }
                    _ => {}
                }
            }
            Message::Close(_) => {
                state.stats.closed_by_peer.fetch_add(1, Ordering::SeqCst);
                let _ = write.close().await;
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

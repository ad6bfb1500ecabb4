//! Dials the OpenAI Realtime WebSocket for one call.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::info;
use zeroize::Zeroizing;

use super::config::realtime_url;
use super::messages::SessionConfig;
use crate::core::bridge::leg::{SinkLeg, inbound_stream};
use crate::core::realtime::base::{
    AiConnection, AiDialer, RealtimeConfig, RealtimeError, RealtimeResult,
};

/// [`AiDialer`] for the OpenAI Realtime API.
///
/// The URL is validated once at construction; each dial performs a fresh
/// WebSocket handshake with bearer authentication.
pub struct OpenAIRealtimeDialer {
    url: url::Url,
    host: String,
    api_key: Zeroizing<String>,
}

impl OpenAIRealtimeDialer {
    pub fn new(config: &RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        let url = realtime_url(&config.url, &config.model)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(RealtimeError::InvalidConfiguration(format!(
                    "Realtime URL has no host: {url}"
                )));
            }
        };

        Ok(Self {
            url,
            host,
            api_key: Zeroizing::new(config.api_key.clone()),
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    fn build_request(&self) -> RealtimeResult<http::Request<()>> {
        http::Request::builder()
            .uri(self.url.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", self.host.as_str())
            .body(())
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl AiDialer for OpenAIRealtimeDialer {
    async fn dial(&self) -> RealtimeResult<AiConnection> {
        let request = self.build_request()?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(map_connect_error)?;

        info!(host = %self.host, "Connected to OpenAI Realtime API");

        let (ws_sink, ws_stream) = ws_stream.split();
        Ok(AiConnection {
            sink: Box::new(SinkLeg::<_, Message>::new(ws_sink)),
            inbound: inbound_stream(ws_stream),
        })
    }
}

fn map_connect_error(error: tungstenite::Error) -> RealtimeError {
    match error {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            RealtimeError::AuthenticationFailed(format!("HTTP {}", response.status()))
        }
        tungstenite::Error::Http(response) => {
            RealtimeError::ConnectionFailed(format!("HTTP {}", response.status()))
        }
        other => RealtimeError::WebSocketError(other.to_string()),
    }
}

/// Build the `session.update` body for a call.
///
/// Turn detection is left unset (serialized as `null`): the bridge commits
/// audio and requests responses on its own cadence.
pub fn build_session_config(config: &RealtimeConfig) -> SessionConfig {
    SessionConfig {
        modalities: Some(
            config
                .modalities
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
        ),
        instructions: config.instructions.clone(),
        voice: Some(config.voice.as_str().to_string()),
        input_audio_format: Some(config.audio_format.as_str().to_string()),
        output_audio_format: Some(config.audio_format.as_str().to_string()),
        turn_detection: None,
        temperature: config.temperature,
    }
}

//! OpenAI Realtime API WebSocket message types.
//!
//! Only the subset of the protocol the bridge speaks is modelled.
//!
//! Client events (sent to server):
//! - session.update - Configure modalities, instructions, voice and formats
//! - input_audio_buffer.append - Append audio to buffer
//! - input_audio_buffer.commit - Commit audio buffer
//! - response.create - Generate a response
//!
//! Server events (received from server):
//! - session.created / session.updated
//! - response.output_audio.delta (legacy: response.audio.delta)
//! - response.output_text.delta (legacy: response.text.delta)
//! - response.output_audio_transcript.delta (legacy: response.audio_transcript.delta)
//! - response.completed (legacy: response.done)
//! - error
//!
//! Every other server event deserializes to [`ServerEvent::Unknown`].

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Turn detection. Left `None`, it goes out as `null`, which switches
    /// server VAD off; the bridge drives turns itself.
    pub turn_detection: Option<serde_json::Value>,

    /// Temperature for response generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

// =============================================================================
// Response Configuration
// =============================================================================

/// Parameters carried by `response.create`.
///
/// The bridge treats these as opaque configuration and forwards them with
/// every solicited response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseConfig {
    /// Response modalities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// Per-response instructions (tone, language)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Voice for audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,
}

impl ResponseConfig {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append base64 audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    /// Commit the input audio buffer
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Create a `response.create`, omitting the body when nothing is set.
    pub fn response_create(config: &ResponseConfig) -> Self {
        ClientEvent::ResponseCreate {
            response: (!config.is_empty()).then(|| config.clone()),
        }
    }

    /// Serialize to the JSON text frame sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error reported by the server; never fatal to the bridge
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: ApiError,
    },

    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: Option<Session>,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: Option<Session>,
    },

    /// Base64 audio chunk of the current response
    #[serde(rename = "response.output_audio.delta", alias = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.output_text.delta", alias = "response.text.delta")]
    TextDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    #[serde(
        rename = "response.output_audio_transcript.delta",
        alias = "response.audio_transcript.delta"
    )]
    AudioTranscriptDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    /// Response finished
    #[serde(rename = "response.completed", alias = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Option<Response>,
    },

    /// Any event type the bridge does not act on
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Session information echoed by `session.created` / `session.updated`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Session {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub input_audio_format: Option<String>,
    #[serde(default)]
    pub output_audio_format: Option<String>,
}

/// Response information carried by `response.completed`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Response {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_details: Option<serde_json::Value>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Token usage of a response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

// =============================================================================
// Tests
// =============================================================================

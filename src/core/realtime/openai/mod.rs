//! OpenAI Realtime API.
//!
//! The AI leg of every call: a WebSocket to
//! `wss://api.openai.com/v1/realtime?model=<model>` speaking JSON events.
//! Audio is base64 inside `input_audio_buffer.append` going up and
//! `response.output_audio.delta` coming down, in `pcm16` (24 kHz) or G.711
//! (8 kHz) as negotiated by `session.update`.

mod config;
mod dialer;
mod messages;

pub use config::{
    Modality, OPENAI_REALTIME_DEFAULT_MODEL, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL,
    OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, realtime_url,
};
pub use dialer::{OpenAIRealtimeDialer, build_session_config};
pub use messages::{
    ApiError, ClientEvent, Response, ResponseConfig, ServerEvent, Session, SessionConfig, Usage,
};

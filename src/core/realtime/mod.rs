//! AI side of the bridge.
//!
//! `base` holds the provider-neutral dialing seam ([`AiDialer`]) and session
//! configuration; `openai` implements it for the OpenAI Realtime API.

mod base;
pub mod openai;

pub use base::{
    AiConnection, AiDialer, DialRetryConfig, RealtimeConfig, RealtimeError, RealtimeResult,
};
pub use openai::{
    ClientEvent, Modality, OpenAIRealtimeAudioFormat, OpenAIRealtimeDialer, OpenAIRealtimeVoice,
    ResponseConfig, ServerEvent,
};

//! Parsing helpers shared by the environment and YAML loaders.

use std::str::FromStr;

use crate::core::bridge::{AiDialFailurePolicy, OverflowPolicy};
use crate::core::codec::CallAudioEncoding;
use crate::core::realtime::openai::Modality;
use crate::core::realtime::{OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice};

/// Parse a number, naming the offending key in the error.
pub fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| format!("Invalid value for {key}: {value:?} ({e})"))
}

/// Parse a boolean the way shells spell them.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Treat empty and whitespace-only values as unset.
pub fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> String {
    format!("Invalid value for {key}: {value:?} (expected {expected})")
}

pub fn parse_call_encoding(key: &str, value: &str) -> Result<CallAudioEncoding, String> {
    CallAudioEncoding::parse(value).ok_or_else(|| invalid(key, value, "mulaw or pcm16"))
}

pub fn parse_audio_format(key: &str, value: &str) -> Result<OpenAIRealtimeAudioFormat, String> {
    OpenAIRealtimeAudioFormat::parse(value)
        .ok_or_else(|| invalid(key, value, "pcm16, g711_ulaw or g711_alaw"))
}

pub fn parse_voice(key: &str, value: &str) -> Result<OpenAIRealtimeVoice, String> {
    OpenAIRealtimeVoice::parse(value).ok_or_else(|| invalid(key, value, "a realtime voice name"))
}

pub fn parse_modalities(key: &str, value: &str) -> Result<Vec<Modality>, String> {
    Modality::parse_list(value).ok_or_else(|| invalid(key, value, "a list of text and audio"))
}

pub fn parse_overflow(key: &str, value: &str) -> Result<OverflowPolicy, String> {
    OverflowPolicy::parse(value).ok_or_else(|| invalid(key, value, "drop_oldest or disconnect"))
}

pub fn parse_dial_failure(key: &str, value: &str) -> Result<AiDialFailurePolicy, String> {
    AiDialFailurePolicy::parse(value).ok_or_else(|| invalid(key, value, "wait or hang_up"))
}

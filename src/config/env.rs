//! Environment variable loading.
//!
//! Every key is optional; unset or empty keys keep the value already in the
//! configuration (the defaults).

use std::env;
use std::path::PathBuf;

use super::utils::{
    non_empty, parse_audio_format, parse_bool, parse_call_encoding, parse_dial_failure,
    parse_modalities, parse_number, parse_overflow, parse_voice,
};
use super::{ServerConfig, TlsConfig};

type EnvResult = Result<(), Box<dyn std::error::Error>>;

fn var(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_empty)
}

/// Overlay environment variables onto `config`.
pub fn apply_env(config: &mut ServerConfig) -> EnvResult {
    apply_server(config)?;
    apply_openai(config)?;
    apply_call(config)?;
    apply_bridge(config)?;
    Ok(())
}

fn apply_server(config: &mut ServerConfig) -> EnvResult {
    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = var("PORT") {
        config.port = parse_number("PORT", &port)?;
    }
    if let Some(public_host) = var("PUBLIC_HOST") {
        config.public_host = Some(public_host);
    }
    if let Some(max) = var("MAX_CONCURRENT_CALLS") {
        let max: usize = parse_number("MAX_CONCURRENT_CALLS", &max)?;
        // 0 means no limit
        config.max_concurrent_calls = (max > 0).then_some(max);
    }

    let tls_enabled = var("TLS_ENABLED").and_then(|v| parse_bool(&v));
    match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) if tls_enabled != Some(false) => {
            config.tls = Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            });
        }
        (Some(_), None) | (None, Some(_)) if tls_enabled != Some(false) => {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into());
        }
        _ => {}
    }
    Ok(())
}

fn apply_openai(config: &mut ServerConfig) -> EnvResult {
    if let Some(key) = var("OPENAI_API_KEY") {
        config.openai_api_key = Some(key);
    }
    if let Some(url) = var("OPENAI_REALTIME_URL") {
        config.openai_realtime_url = url;
    }
    if let Some(model) = var("OPENAI_REALTIME_MODEL") {
        config.openai_realtime_model = model;
    }
    if let Some(voice) = var("OPENAI_REALTIME_VOICE") {
        config.openai_realtime_voice = parse_voice("OPENAI_REALTIME_VOICE", &voice)?;
    }
    if let Some(format) = var("AI_AUDIO_FORMAT") {
        config.ai_audio_format = parse_audio_format("AI_AUDIO_FORMAT", &format)?;
    }
    if let Some(instructions) = var("AGENT_INSTRUCTIONS") {
        config.agent_instructions = Some(instructions);
    }
    if let Some(instructions) = var("RESPONSE_INSTRUCTIONS") {
        config.response_instructions = Some(instructions);
    }
    if let Some(modalities) = var("RESPONSE_MODALITIES") {
        config.response_modalities = parse_modalities("RESPONSE_MODALITIES", &modalities)?;
    }
    Ok(())
}

fn apply_call(config: &mut ServerConfig) -> EnvResult {
    if let Some(encoding) = var("CALL_AUDIO_ENCODING") {
        config.call_audio_encoding = parse_call_encoding("CALL_AUDIO_ENCODING", &encoding)?;
    }
    if let Some(secs) = var("MAX_CALL_DURATION_SECS") {
        config.max_call_duration_secs = parse_number("MAX_CALL_DURATION_SECS", &secs)?;
    }
    if let Some(text) = var("GREETING_TEXT") {
        config.greeting_text = Some(text);
    }
    if let Some(language) = var("GREETING_LANGUAGE") {
        config.greeting_language = Some(language);
    }
    if let Some(voice) = var("GREETING_VOICE") {
        config.greeting_voice = Some(voice);
    }
    Ok(())
}

fn apply_bridge(config: &mut ServerConfig) -> EnvResult {
    if let Some(ms) = var("COMMIT_INTERVAL_MS") {
        config.commit_interval_ms = parse_number("COMMIT_INTERVAL_MS", &ms)?;
    }
    if let Some(ms) = var("COMMIT_MIN_AUDIO_MS") {
        config.commit_min_audio_ms = parse_number("COMMIT_MIN_AUDIO_MS", &ms)?;
    }
    if let Some(frames) = var("READINESS_BUFFER_FRAMES") {
        config.readiness_buffer_frames = parse_number("READINESS_BUFFER_FRAMES", &frames)?;
    }
    if let Some(policy) = var("READINESS_BUFFER_OVERFLOW") {
        config.readiness_buffer_overflow = parse_overflow("READINESS_BUFFER_OVERFLOW", &policy)?;
    }
    if let Some(secs) = var("AI_CONNECT_TIMEOUT_SECS") {
        config.ai_connect_timeout_secs = parse_number("AI_CONNECT_TIMEOUT_SECS", &secs)?;
    }
    if let Some(policy) = var("AI_DIAL_FAILURE") {
        config.ai_dial_failure = parse_dial_failure("AI_DIAL_FAILURE", &policy)?;
    }
    if let Some(attempts) = var("AI_DIAL_MAX_ATTEMPTS") {
        config.ai_dial_max_attempts = parse_number("AI_DIAL_MAX_ATTEMPTS", &attempts)?;
    }
    if let Some(ms) = var("CLOSE_GRACE_MS") {
        config.close_grace_ms = parse_number("CLOSE_GRACE_MS", &ms)?;
    }
    Ok(())
}

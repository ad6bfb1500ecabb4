//! Configuration validation logic.

use url::Url;

use super::ServerConfig;

const MAX_COMMIT_INTERVAL_MS: u64 = 60_000;
const MAX_COMMIT_MIN_AUDIO_MS: u64 = 60_000;
const MAX_CLOSE_GRACE_MS: u64 = 60_000;
const MAX_CALL_DURATION_SECS: u64 = 86_400;
const MAX_AI_CONNECT_TIMEOUT_SECS: u64 = 300;

/// Check the merged configuration for values the bridge cannot run with.
pub fn validate(config: &ServerConfig) -> Result<(), String> {
    if config.commit_interval_ms == 0 {
        return Err("COMMIT_INTERVAL_MS must be greater than 0".to_string());
    }
    if config.readiness_buffer_frames == 0 {
        return Err("READINESS_BUFFER_FRAMES must be greater than 0".to_string());
    }
    if config.max_call_duration_secs == 0 {
        return Err("MAX_CALL_DURATION_SECS must be greater than 0".to_string());
    }
    if config.ai_connect_timeout_secs == 0 {
        return Err("AI_CONNECT_TIMEOUT_SECS must be greater than 0".to_string());
    }

    check_upper_bound("COMMIT_INTERVAL_MS", config.commit_interval_ms, MAX_COMMIT_INTERVAL_MS)?;
    check_upper_bound(
        "COMMIT_MIN_AUDIO_MS",
        config.commit_min_audio_ms,
        MAX_COMMIT_MIN_AUDIO_MS,
    )?;
    check_upper_bound("CLOSE_GRACE_MS", config.close_grace_ms, MAX_CLOSE_GRACE_MS)?;
    check_upper_bound(
        "MAX_CALL_DURATION_SECS",
        config.max_call_duration_secs,
        MAX_CALL_DURATION_SECS,
    )?;
    check_upper_bound(
        "AI_CONNECT_TIMEOUT_SECS",
        config.ai_connect_timeout_secs,
        MAX_AI_CONNECT_TIMEOUT_SECS,
    )?;

    if config.response_modalities.is_empty() {
        return Err("RESPONSE_MODALITIES must name at least one modality".to_string());
    }

    validate_realtime_url(&config.openai_realtime_url)?;

    if let Some(ref tls) = config.tls {
        if !tls.cert_path.exists() {
            return Err(format!(
                "TLS certificate not found: {}",
                tls.cert_path.display()
            ));
        }
        if !tls.key_path.exists() {
            return Err(format!("TLS key not found: {}", tls.key_path.display()));
        }
    }

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; calls will fail to reach the AI service");
    }

    Ok(())
}

fn check_upper_bound(key: &str, value: u64, max: u64) -> Result<(), String> {
    if value > max {
        return Err(format!("{key} must be at most {max}, got {value}"));
    }
    Ok(())
}

fn validate_realtime_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid OPENAI_REALTIME_URL {url}: {e}"))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!(
            "OPENAI_REALTIME_URL must use ws or wss, got {other}"
        )),
    }
}

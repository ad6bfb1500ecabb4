//! Audio Test Fixtures
//!
//! Programmatically generated telephony audio, so tests need no files.
//!
//! Audio formats:
//! - Sample rate: 8kHz (call leg)
//! - Bit depth: 16-bit signed PCM before G.711 companding
//! - Channels: Mono
//! - Frame: 20ms, the packet size media streams use

use std::f32::consts::PI;

use base64::prelude::*;
use callbridge::core::codec::g711;

/// Call-leg sample rate
pub const SAMPLE_RATE: u32 = 8000;

/// Samples in one 20ms frame at 8kHz
pub const FRAME_SAMPLES: usize = 160;

/// Generate silence (zeros)
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Generate a sine wave tone
pub fn generate_sine_wave(duration_samples: usize, frequency: f32, amplitude: f32) -> Vec<i16> {
    let max_amplitude = amplitude * i16::MAX as f32;
    let angular_freq = 2.0 * PI * frequency / SAMPLE_RATE as f32;

    (0..duration_samples)
        .map(|i| ((angular_freq * i as f32).sin() * max_amplitude) as i16)
        .collect()
}

/// Speech-like signal: a 300Hz carrier with a slow amplitude envelope
pub fn generate_speech_like(duration_samples: usize) -> Vec<i16> {
    let carrier = generate_sine_wave(duration_samples, 300.0, 0.6);
    carrier
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let envelope = 0.5 + 0.5 * (2.0 * PI * 4.0 * i as f32 / SAMPLE_RATE as f32).sin();
            (s as f32 * envelope) as i16
        })
        .collect()
}

/// Convert i16 samples to little-endian bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// One 20ms μ-law frame of a 440Hz tone
pub fn mulaw_tone_frame() -> Vec<u8> {
    g711::encode_ulaw(&generate_sine_wave(FRAME_SAMPLES, 440.0, 0.5))
}

/// μ-law frames of a speech-like signal, 20ms each
pub fn mulaw_speech_frames(count: usize) -> Vec<Vec<u8>> {
    let samples = generate_speech_like(FRAME_SAMPLES * count);
    samples
        .chunks(FRAME_SAMPLES)
        .map(g711::encode_ulaw)
        .collect()
}

/// Call-leg `media` frame carrying `payload`
pub fn media_event(stream_sid: &str, payload: &[u8]) -> String {
    serde_json::json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": {
            "track": "inbound",
            "chunk": "1",
            "timestamp": "0",
            "payload": BASE64_STANDARD.encode(payload)
        }
    })
    .to_string()
}

/// Call-leg `start` frame declaring μ-law at 8kHz
pub fn start_event(stream_sid: &str) -> String {
    serde_json::json!({
        "event": "start",
        "sequenceNumber": "1",
        "streamSid": stream_sid,
        "start": {
            "streamSid": stream_sid,
            "callSid": "CA00000000000000000000000000000000",
            "tracks": ["inbound"],
            "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
        }
    })
    .to_string()
}

pub fn connected_event() -> String {
    r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#.to_string()
}

pub fn stop_event(stream_sid: &str) -> String {
    serde_json::json!({"event": "stop", "streamSid": stream_sid}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sizes() {
        assert_eq!(mulaw_tone_frame().len(), FRAME_SAMPLES);
        let frames = mulaw_speech_frames(5);
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.len() == FRAME_SAMPLES));
    }
}

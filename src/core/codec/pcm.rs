//! Linear PCM helpers: little-endian byte packing and sample-rate conversion.

use super::CodecError;

/// Unpack 16-bit little-endian PCM bytes into samples.
///
/// An odd byte count means a torn sample and is rejected rather than padded.
pub fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<i16>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Pack samples into 16-bit little-endian PCM bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Resample by linear interpolation between neighbouring source samples.
///
/// Output length is `len * to / from` (truncated). Identity when the rates
/// match.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let last = samples.len() - 1;

    let mut resampled = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 * ratio;
        let idx0 = (src_idx.floor() as usize).min(last);
        let idx1 = (idx0 + 1).min(last);
        let frac = src_idx - idx0 as f64;

        let sample = samples[idx0] as f64 * (1.0 - frac) + samples[idx1] as f64 * frac;
        resampled.push(sample.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }
    resampled
}

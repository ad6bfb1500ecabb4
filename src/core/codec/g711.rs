//! G.711 companding (ITU-T G.711).
//!
//! μ-law works on the 14 most significant bits of the sample with a bias of
//! 33; A-law works on the 13 most significant bits and toggles the even bits
//! of the code word. Both are stateless, one byte per sample.

/// Compress a 16-bit linear PCM sample to an 8-bit μ-law code.
#[inline]
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let magnitude = if sample < 0 {
        ((!sample) >> 2) + 33
    } else {
        (sample >> 2) + 33
    };
    let magnitude = magnitude.min(0x1FFF);

    let mut segment: i16 = 1;
    let mut shifted = magnitude >> 6;
    while shifted != 0 {
        segment += 1;
        shifted >>= 1;
    }

    let high_nibble = 0x0008 - segment;
    let low_nibble = 0x000F - ((magnitude >> segment) & 0x000F);
    let mut code = (high_nibble << 4) | low_nibble;
    if sample >= 0 {
        code |= 0x0080;
    }
    code as u8
}

/// Expand an 8-bit μ-law code to a 16-bit linear PCM sample.
#[inline]
pub fn ulaw_to_linear(code: u8) -> i16 {
    let sign: i16 = if code < 0x80 { -1 } else { 1 };
    let inverted = (!code) as i16;
    let exponent = (inverted >> 4) & 0x0007;
    let mantissa = inverted & 0x000F;
    let step: i16 = 4 << (exponent + 1);

    sign * ((0x0080i16 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

/// Compress a 16-bit linear PCM sample to an 8-bit A-law code.
#[inline]
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut value = if sample < 0 { (!sample) >> 4 } else { sample >> 4 };

    if value > 15 {
        let mut exponent: i16 = 1;
        while value > 16 + 15 {
            value >>= 1;
            exponent += 1;
        }
        value -= 16;
        value += exponent << 4;
    }

    if sample >= 0 {
        value |= 0x0080;
    }
    (value ^ 0x0055) as u8
}

/// Expand an 8-bit A-law code to a 16-bit linear PCM sample.
#[inline]
pub fn alaw_to_linear(code: u8) -> i16 {
    let value = ((code ^ 0x55) & 0x7F) as i16;
    let exponent = value >> 4;
    let mut mantissa = value & 0x000F;

    if exponent > 0 {
        mantissa += 16;
    }
    mantissa = (mantissa << 4) + 0x0008;
    if exponent > 1 {
        mantissa <<= exponent - 1;
    }

    if code > 127 { mantissa } else { -mantissa }
}

/// Encode a block of linear samples as μ-law.
pub fn encode_ulaw(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| linear_to_ulaw(s)).collect()
}

/// Decode a block of μ-law codes to linear samples.
pub fn decode_ulaw(codes: &[u8]) -> Vec<i16> {
    codes.iter().map(|&c| ulaw_to_linear(c)).collect()
}

/// Encode a block of linear samples as A-law.
pub fn encode_alaw(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| linear_to_alaw(s)).collect()
}

/// Decode a block of A-law codes to linear samples.
pub fn decode_alaw(codes: &[u8]) -> Vec<i16> {
    codes.iter().map(|&c| alaw_to_linear(c)).collect()
}

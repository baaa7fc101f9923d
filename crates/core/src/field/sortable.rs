//! Order-preserving string encodings for numbers
//!
//! ## Sign-marker scheme (floats and integers)
//!
//! `<sign><16 hex digits>` where the sign is `-` for negative values and
//! `0` otherwise, and the digits are the magnitude's 64-bit pattern in
//! lowercase big-endian hex. For negative values the pattern is bitwise
//! complemented, so larger magnitudes sort first. `-` sorts before `0`,
//! which orders the two halves across zero.
//!
//! For floats the magnitude is the IEEE-754 bit pattern of `|v|`, which is
//! monotonic in `|v|` for finite non-negative doubles. For integers it is
//! `|v|` itself.
//!
//! ## Offset scheme (integers only)
//!
//! `!` followed by 16 hex digits of `v - i64::MIN`. Fixed width and
//! unsigned, so plain string order is numeric order without a sign marker.

use crate::error::ValidationError;

const NEGATIVE: char = '-';
const NON_NEGATIVE: char = '0';
const OFFSET: char = '!';

/// Sign marker plus 16 hex digits
const ENCODED_LEN: usize = 17;

/// 16 lowercase hex digits, most significant first
fn hex_u64(value: u64) -> String {
    hex::encode(value.to_be_bytes())
}

fn parse_hex_u64(digits: &str) -> Result<u64, hex::FromHexError> {
    let mut bytes = [0u8; 8];
    hex::decode_to_slice(digits, &mut bytes)?;
    Ok(u64::from_be_bytes(bytes))
}

fn encode_magnitude(magnitude: u64, negative: bool) -> String {
    let (sign, bits) = if negative {
        (NEGATIVE, !magnitude)
    } else {
        (NON_NEGATIVE, magnitude)
    };
    format!("{}{}", sign, hex_u64(bits))
}

fn decode_magnitude(encoded: &str) -> Result<(bool, u64), ValidationError> {
    if encoded.len() != ENCODED_LEN || !encoded.is_ascii() {
        return Err(ValidationError::new(format!(
            "invalid sortable number '{}'",
            encoded
        )));
    }
    let negative = match encoded.as_bytes()[0] as char {
        NEGATIVE => true,
        NON_NEGATIVE => false,
        other => {
            return Err(ValidationError::new(format!(
                "invalid sign marker '{}' in sortable number",
                other
            )))
        }
    };
    let bits = parse_hex_u64(&encoded[1..]).map_err(|e| {
        ValidationError::new(format!("invalid sortable number '{}': {}", encoded, e))
    })?;
    Ok((negative, if negative { !bits } else { bits }))
}

/// Encode a finite double so that string order matches numeric order
///
/// `-0.0` encodes like `0.0`.
pub fn encode_f64(value: f64) -> String {
    let value = if value == 0.0 { 0.0_f64 } else { value };
    encode_magnitude(value.abs().to_bits(), value.is_sign_negative())
}

/// Reverse [`encode_f64`]
pub fn decode_f64(encoded: &str) -> Result<f64, ValidationError> {
    let (negative, bits) = decode_magnitude(encoded)?;
    let magnitude = f64::from_bits(bits);
    if !magnitude.is_finite() {
        return Err(ValidationError::new(format!(
            "sortable number '{}' is not finite",
            encoded
        )));
    }
    Ok(if negative { -magnitude } else { magnitude })
}

/// Encode an integer with the sign-marker scheme
pub fn encode_i64(value: i64) -> String {
    encode_magnitude(value.unsigned_abs(), value < 0)
}

/// Encode an integer with the offset scheme
pub fn encode_i64_offset(value: i64) -> String {
    format!("{}{}", OFFSET, hex_u64((value as u64) ^ (1u64 << 63)))
}

/// Decode an integer written by either [`encode_i64`] or [`encode_i64_offset`]
pub fn decode_i64(encoded: &str) -> Result<i64, ValidationError> {
    if let Some(digits) = encoded.strip_prefix(OFFSET) {
        let raw = parse_hex_u64(digits).map_err(|e| {
            ValidationError::new(format!("invalid offset integer '{}': {}", encoded, e))
        })?;
        return Ok((raw ^ (1u64 << 63)) as i64);
    }

    let (negative, magnitude) = decode_magnitude(encoded)?;
    if negative {
        if magnitude == 0 || magnitude > 1u64 << 63 {
            return Err(ValidationError::new(format!(
                "sortable integer '{}' is out of range",
                encoded
            )));
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| {
            ValidationError::new(format!("sortable integer '{}' is out of range", encoded))
        })
    }
}

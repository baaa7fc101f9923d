//! Percent-escaping for URL-query-safe encodings
//!
//! Everything outside the RFC 3986 unreserved set is written as `%XX`.

use crate::error::ValidationError;
use std::fmt::Write;

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Percent-escape a string
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
    }
    out
}

/// Reverse [`escape`]
pub fn unescape(input: &str) -> Result<String, ValidationError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .ok_or_else(|| ValidationError::new(format!("truncated escape in '{}'", input)))?;
            let b = u8::from_str_radix(hex, 16)
                .map_err(|_| ValidationError::new(format!("invalid escape '%{}'", hex)))?;
            out.push(b);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ValidationError::new("escaped text is not valid UTF-8"))
}

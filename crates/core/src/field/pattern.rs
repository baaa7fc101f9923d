//! Pattern-constrained string kinds
//!
//! Each pattern both checks and normalizes its input: UUIDs come back in
//! lowercase hyphenated form, ULIDs in uppercase.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;

// Literal patterns; compiling them cannot fail
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(?:\.[^\s@.]+)+$").expect("email pattern"));
static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s\p{Cc}/?#]+(?:[/?#][^\s\p{Cc}]*)?$").expect("URL pattern")
});
static ULID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-7][0-9A-HJKMNP-TV-Z]{25}$").expect("ULID pattern"));
static ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("identifier pattern"));

/// String shape enforced by a `Field::Pattern`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// `local@domain.tld`
    Email,
    /// Absolute `http` or `https` URL
    Url,
    /// RFC 4122 UUID
    Uuid,
    /// 26-character Crockford base32 ULID
    Ulid,
    /// Opaque identifier: 1 to 64 of `[A-Za-z0-9_-]`
    Id,
}

impl Pattern {
    /// Human-readable name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Email => "email address",
            Pattern::Url => "URL",
            Pattern::Uuid => "UUID",
            Pattern::Ulid => "ULID",
            Pattern::Id => "identifier",
        }
    }

    /// Check `input` and return its normalized form
    pub fn check(&self, input: &str) -> Result<String, ValidationError> {
        let (normalized, re) = match self {
            Pattern::Uuid => {
                return uuid::Uuid::parse_str(input)
                    .map(|u| u.hyphenated().to_string())
                    .map_err(|_| self.invalid(input))
            }
            Pattern::Email => (input.to_string(), &*EMAIL),
            Pattern::Url => (input.to_string(), &*URL),
            Pattern::Ulid => (input.to_ascii_uppercase(), &*ULID),
            Pattern::Id => (input.to_string(), &*ID),
        };
        if re.is_match(&normalized) {
            Ok(normalized)
        } else {
            Err(self.invalid(input))
        }
    }

    fn invalid(&self, input: &str) -> ValidationError {
        ValidationError::new(format!("'{}' is not a valid {}", input, self.name()))
    }
}

/// Generate a new ULID in canonical uppercase form
pub fn new_ulid() -> String {
    ulid::Ulid::new().to_string()
}

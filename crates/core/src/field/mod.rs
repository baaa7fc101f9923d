//! Typed field codecs
//!
//! A [`Field`] validates one value and converts it between four forms:
//!
//! | Form | Type | Used for |
//! |------|------|----------|
//! | validated | [`Value`] | in-memory records |
//! | wire | `serde_json::Value` | API payloads (`serialize` / `deserialize`) |
//! | encoded | `String` | URL query strings, composite item names (`encode` / `decode`) |
//! | sortable | `String` | cursors and attribute-store values (`encode_sortable` / `decode_sortable`) |
//!
//! The sortable form preserves the natural order of the value under plain
//! byte-wise string comparison. Every decoding path re-validates its result.
//!
//! `Nullable` and `List` decorate any other field. `Nullable` treats `null`
//! and the empty string as the same value in every form. An empty list
//! encodes as `~` so that it stays distinct from `null`.

mod escape;
mod pattern;
pub mod sortable;

pub use escape::{escape, unescape};
pub use pattern::{new_ulid, Pattern};

use crate::error::{PathSegment, ValidationError};
use crate::value::Value;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde_json::Value as JsonValue;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATA_URI_PREFIX: &str = "data:application/octet-stream;base64,";
const MAX_DECIMAL_PLACES: u32 = 18;
const LIST_TERMINATOR: char = ',';
/// Encoded empty list; never produced by a non-empty list and never empty itself
const EMPTY_LIST: &str = "~";

/// Optional inclusive numeric bounds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds<T> {
    /// Smallest accepted value
    pub min: Option<T>,
    /// Largest accepted value
    pub max: Option<T>,
}

impl<T: PartialOrd + std::fmt::Display + Copy> Bounds<T> {
    fn check(&self, value: T) -> Result<(), ValidationError> {
        if let Some(min) = self.min {
            if value < min {
                return Err(ValidationError::new(format!("must be at least {}", min)));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Err(ValidationError::new(format!("must be at most {}", max)));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum IntScheme {
    SignMarker,
    Offset,
}

/// Codec for a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Any string, including empty
    Text,
    /// Whitespace-trimmed, non-empty string
    Trimmed,
    /// One of a fixed set of strings
    Choice(Vec<String>),
    /// 64-bit integer
    Integer(Bounds<i64>),
    /// Finite double
    Float(Bounds<f64>),
    /// Boolean
    Boolean,
    /// Calendar date, years 1 through 9999
    Date,
    /// UTC instant with microsecond precision, years 1 through 9999
    DateTime,
    /// Epoch milliseconds
    Timestamp,
    /// String matching a fixed pattern
    Pattern(Pattern),
    /// Decimal kept as a string with exactly `places` fraction digits
    Decimal {
        /// Number of fraction digits
        places: u32,
    },
    /// Binary blob
    Binary,
    /// `null` (or the empty string) or a value of the wrapped field
    Nullable(Box<Field>),
    /// List whose elements all follow the wrapped field
    List(Box<Field>),
}

impl Field {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Unconstrained text
    pub fn text() -> Self {
        Field::Text
    }

    /// Trimmed non-empty text
    pub fn trimmed() -> Self {
        Field::Trimmed
    }

    /// Enumerated choice
    pub fn choice<S: AsRef<str>>(options: &[S]) -> Self {
        Field::Choice(options.iter().map(|s| s.as_ref().to_string()).collect())
    }

    /// Unbounded integer
    pub fn integer() -> Self {
        Field::Integer(Bounds::default())
    }

    /// Integer within optional inclusive bounds
    pub fn integer_range(min: Option<i64>, max: Option<i64>) -> Self {
        Field::Integer(Bounds { min, max })
    }

    /// Unbounded finite float
    pub fn float() -> Self {
        Field::Float(Bounds::default())
    }

    /// Float within optional inclusive bounds
    pub fn float_range(min: Option<f64>, max: Option<f64>) -> Self {
        Field::Float(Bounds { min, max })
    }

    /// Boolean
    pub fn boolean() -> Self {
        Field::Boolean
    }

    /// Calendar date
    pub fn date() -> Self {
        Field::Date
    }

    /// UTC date-time
    pub fn datetime() -> Self {
        Field::DateTime
    }

    /// Epoch-millisecond timestamp
    pub fn timestamp() -> Self {
        Field::Timestamp
    }

    /// Email address
    pub fn email() -> Self {
        Field::Pattern(Pattern::Email)
    }

    /// http(s) URL
    pub fn url() -> Self {
        Field::Pattern(Pattern::Url)
    }

    /// UUID
    pub fn uuid() -> Self {
        Field::Pattern(Pattern::Uuid)
    }

    /// ULID
    pub fn ulid() -> Self {
        Field::Pattern(Pattern::Ulid)
    }

    /// Opaque identifier
    pub fn id() -> Self {
        Field::Pattern(Pattern::Id)
    }

    /// Fixed-precision decimal
    pub fn decimal(places: u32) -> Self {
        Field::Decimal { places }
    }

    /// Binary blob
    pub fn binary() -> Self {
        Field::Binary
    }

    /// Wrap in `Nullable`
    pub fn nullable(self) -> Self {
        Field::Nullable(Box::new(self))
    }

    /// Wrap in `List`
    pub fn list(self) -> Self {
        Field::List(Box::new(self))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// True for `Nullable`
    pub fn is_nullable(&self) -> bool {
        matches!(self, Field::Nullable(_))
    }

    /// The field with any `Nullable` wrapper removed
    pub fn inner(&self) -> &Field {
        match self {
            Field::Nullable(inner) => inner.inner(),
            other => other,
        }
    }

    /// Short name of the field kind
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Text => "text",
            Field::Trimmed => "trimmed text",
            Field::Choice(_) => "choice",
            Field::Integer(_) => "integer",
            Field::Float(_) => "float",
            Field::Boolean => "boolean",
            Field::Date => "date",
            Field::DateTime => "datetime",
            Field::Timestamp => "timestamp",
            Field::Pattern(p) => p.name(),
            Field::Decimal { .. } => "decimal",
            Field::Binary => "binary",
            Field::Nullable(inner) => inner.kind(),
            Field::List(_) => "list",
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Enforce the field's domain constraints, returning the normalized value
    pub fn validate(&self, value: Value) -> Result<Value, ValidationError> {
        match self {
            Field::Nullable(inner) => match value {
                Value::Null => Ok(Value::Null),
                Value::Text(ref s) if s.is_empty() => Ok(Value::Null),
                other => inner.validate(other),
            },
            Field::List(inner) => match value {
                Value::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    let mut errors = Vec::new();
                    for (i, item) in items.into_iter().enumerate() {
                        match inner.validate(item) {
                            Ok(v) => out.push(v),
                            Err(e) => errors.push((PathSegment::Index(i), e)),
                        }
                    }
                    if errors.is_empty() {
                        Ok(Value::List(out))
                    } else {
                        Err(ValidationError::composite("list contains invalid items", errors))
                    }
                }
                other => Err(ValidationError::expected("list", &other)),
            },
            Field::Text => match value {
                Value::Text(s) => Ok(Value::Text(s)),
                other => Err(ValidationError::expected("text", &other)),
            },
            Field::Trimmed => match value {
                Value::Text(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        Err(ValidationError::new("must not be blank"))
                    } else {
                        Ok(Value::Text(trimmed.to_string()))
                    }
                }
                other => Err(ValidationError::expected("text", &other)),
            },
            Field::Choice(options) => match value {
                Value::Text(s) if options.iter().any(|o| *o == s) => Ok(Value::Text(s)),
                Value::Text(s) => Err(ValidationError::new(format!(
                    "'{}' must be one of {}",
                    s,
                    options.join(", ")
                ))),
                other => Err(ValidationError::expected("text", &other)),
            },
            Field::Integer(bounds) => match value {
                Value::Int(v) => {
                    bounds.check(v)?;
                    Ok(Value::Int(v))
                }
                other => Err(ValidationError::expected("integer", &other)),
            },
            Field::Float(bounds) => {
                let v = match value {
                    Value::Float(v) => v,
                    Value::Int(v) => v as f64,
                    other => return Err(ValidationError::expected("float", &other)),
                };
                if !v.is_finite() {
                    return Err(ValidationError::new("must be a finite number"));
                }
                bounds.check(v)?;
                Ok(Value::Float(if v == 0.0 { 0.0 } else { v }))
            }
            Field::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(b)),
                other => Err(ValidationError::expected("boolean", &other)),
            },
            Field::Date => {
                let date = match value {
                    Value::Date(d) => d,
                    Value::Text(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|_| {
                        ValidationError::new(format!("'{}' is not a YYYY-MM-DD date", s))
                    })?,
                    other => return Err(ValidationError::expected("date", &other)),
                };
                check_year(date.year())?;
                Ok(Value::Date(date))
            }
            Field::DateTime => {
                let dt = match value {
                    Value::DateTime(dt) => dt,
                    Value::Text(s) => DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|_| {
                            ValidationError::new(format!("'{}' is not an RFC 3339 date-time", s))
                        })?,
                    other => return Err(ValidationError::expected("datetime", &other)),
                };
                check_year(dt.year())?;
                Ok(Value::DateTime(dt.trunc_subsecs(6)))
            }
            Field::Timestamp => match value {
                Value::Int(ms) => Ok(Value::Int(ms)),
                Value::DateTime(dt) => Ok(Value::Int(dt.timestamp_millis())),
                other => Err(ValidationError::expected("timestamp", &other)),
            },
            Field::Pattern(pattern) => match value {
                Value::Text(s) => pattern.check(&s).map(Value::Text),
                other => Err(ValidationError::expected("text", &other)),
            },
            Field::Decimal { places } => {
                let scaled = match value {
                    Value::Text(s) => parse_scaled(&s, *places)?,
                    Value::Int(v) => parse_scaled(&v.to_string(), *places)?,
                    Value::Float(v) if v.is_finite() => {
                        parse_scaled(&format!("{:.*}", *places as usize, v), *places)?
                    }
                    other => return Err(ValidationError::expected("decimal", &other)),
                };
                Ok(Value::Text(format_scaled(scaled, *places)?))
            }
            Field::Binary => match value {
                Value::Bytes(b) => Ok(Value::Bytes(b)),
                other => Err(ValidationError::expected("bytes", &other)),
            },
        }
    }

    // =========================================================================
    // Wire form
    // =========================================================================

    /// Convert a validated value to its API wire form
    pub fn serialize(&self, value: &Value) -> Result<JsonValue, ValidationError> {
        match (self, value) {
            (Field::Nullable(_), Value::Null) => Ok(JsonValue::Null),
            (Field::Nullable(inner), v) => inner.serialize(v),
            (Field::List(inner), Value::List(items)) => items
                .iter()
                .map(|item| inner.serialize(item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            (
                Field::Text
                | Field::Trimmed
                | Field::Choice(_)
                | Field::Pattern(_)
                | Field::Decimal { .. },
                Value::Text(s),
            ) => Ok(JsonValue::String(s.clone())),
            (Field::Integer(_) | Field::Timestamp, Value::Int(v)) => Ok(JsonValue::from(*v)),
            (Field::Float(_), Value::Float(v)) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .ok_or_else(|| ValidationError::new("must be a finite number")),
            (Field::Boolean, Value::Bool(b)) => Ok(JsonValue::Bool(*b)),
            (Field::Date, Value::Date(d)) => Ok(JsonValue::String(format_date(d))),
            (Field::DateTime, Value::DateTime(dt)) => Ok(JsonValue::String(format_datetime(dt))),
            (Field::Binary, Value::Bytes(b)) => Ok(JsonValue::String(format!(
                "{}{}",
                DATA_URI_PREFIX,
                STANDARD.encode(b)
            ))),
            (field, other) => Err(ValidationError::expected(field.kind(), other)),
        }
    }

    /// Convert an API wire value into a validated value
    pub fn deserialize(&self, wire: &JsonValue) -> Result<Value, ValidationError> {
        match (self, wire) {
            (Field::Nullable(_), JsonValue::Null) => Ok(Value::Null),
            (Field::Nullable(_), JsonValue::String(s)) if s.is_empty() => Ok(Value::Null),
            (Field::Nullable(inner), w) => inner.deserialize(w),
            (Field::List(inner), JsonValue::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                let mut errors = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    match inner.deserialize(item) {
                        Ok(v) => out.push(v),
                        Err(e) => errors.push((PathSegment::Index(i), e)),
                    }
                }
                if errors.is_empty() {
                    Ok(Value::List(out))
                } else {
                    Err(ValidationError::composite("list contains invalid items", errors))
                }
            }
            (Field::Integer(_) | Field::Timestamp, JsonValue::Number(n)) => match n.as_i64() {
                Some(v) => self.validate(Value::Int(v)),
                None => Err(ValidationError::new(format!("{} is not an integer", n))),
            },
            (Field::Float(_), JsonValue::Number(n)) => match n.as_f64() {
                Some(v) => self.validate(Value::Float(v)),
                None => Err(ValidationError::new(format!("{} is not a number", n))),
            },
            (Field::Decimal { .. }, JsonValue::Number(n)) => match n.as_i64() {
                Some(v) => self.validate(Value::Int(v)),
                None => match n.as_f64() {
                    Some(v) => self.validate(Value::Float(v)),
                    None => Err(ValidationError::new(format!("{} is not a number", n))),
                },
            },
            (Field::Boolean, JsonValue::Bool(b)) => Ok(Value::Bool(*b)),
            (Field::Binary, JsonValue::String(s)) => parse_data_uri(s).map(Value::Bytes),
            (
                Field::Text
                | Field::Trimmed
                | Field::Choice(_)
                | Field::Pattern(_)
                | Field::Decimal { .. }
                | Field::Date
                | Field::DateTime,
                JsonValue::String(s),
            ) => self.validate(Value::Text(s.clone())),
            (field, other) => Err(ValidationError::new(format!(
                "expected {}, got {}",
                field.kind(),
                json_type_name(other)
            ))),
        }
    }

    // =========================================================================
    // URL-safe form
    // =========================================================================

    /// Convert a validated value to its URL-query-safe string
    pub fn encode(&self, value: &Value) -> Result<String, ValidationError> {
        match (self, value) {
            (Field::Nullable(_), Value::Null) => Ok(String::new()),
            (Field::Nullable(inner), v) => inner.encode(v),
            (Field::List(inner), Value::List(items)) => {
                join_list(items, |item| inner.encode(item))
            }
            (
                Field::Text
                | Field::Trimmed
                | Field::Choice(_)
                | Field::Pattern(_)
                | Field::Decimal { .. },
                Value::Text(s),
            ) => Ok(s.clone()),
            (Field::Integer(_) | Field::Timestamp, Value::Int(v)) => Ok(v.to_string()),
            (Field::Float(_), Value::Float(v)) => Ok(v.to_string()),
            (Field::Boolean, Value::Bool(b)) => Ok(b.to_string()),
            (Field::Date, Value::Date(d)) => Ok(format_date(d)),
            (Field::DateTime, Value::DateTime(dt)) => Ok(format_datetime(dt)),
            (Field::Binary, Value::Bytes(b)) => Ok(URL_SAFE_NO_PAD.encode(b)),
            (field, other) => Err(ValidationError::expected(field.kind(), other)),
        }
    }

    /// Reverse [`Field::encode`]
    pub fn decode(&self, encoded: &str) -> Result<Value, ValidationError> {
        match self {
            Field::Nullable(_) if encoded.is_empty() => Ok(Value::Null),
            Field::Nullable(inner) => inner.decode(encoded),
            Field::List(inner) => split_list(encoded, |item| inner.decode(item)),
            Field::Integer(_) | Field::Timestamp => {
                let v = encoded.parse::<i64>().map_err(|_| {
                    ValidationError::new(format!("'{}' is not an integer", encoded))
                })?;
                self.validate(Value::Int(v))
            }
            Field::Float(_) => {
                let v = encoded.parse::<f64>().map_err(|_| {
                    ValidationError::new(format!("'{}' is not a number", encoded))
                })?;
                self.validate(Value::Float(v))
            }
            Field::Boolean => parse_bool(encoded),
            Field::Binary => URL_SAFE_NO_PAD
                .decode(encoded)
                .map(Value::Bytes)
                .map_err(|_| ValidationError::new("invalid base64url data")),
            _ => self.validate(Value::Text(encoded.to_string())),
        }
    }

    // =========================================================================
    // Sortable form
    // =========================================================================

    /// Convert a validated value to a string whose byte order matches the value order
    pub fn encode_sortable(&self, value: &Value) -> Result<String, ValidationError> {
        self.sortable(value, IntScheme::SignMarker)
    }

    /// Like [`Field::encode_sortable`], but integers use the offset scheme
    ///
    /// Used where every stored value must be fixed-width and unsigned.
    /// [`Field::decode_sortable`] reads both forms.
    pub fn encode_sortable_offset(&self, value: &Value) -> Result<String, ValidationError> {
        self.sortable(value, IntScheme::Offset)
    }

    fn sortable(&self, value: &Value, scheme: IntScheme) -> Result<String, ValidationError> {
        match (self, value) {
            (Field::Nullable(_), Value::Null) => Ok(String::new()),
            (Field::Nullable(inner), v) => inner.sortable(v, scheme),
            (Field::List(inner), Value::List(items)) => {
                join_list(items, |item| inner.sortable(item, scheme))
            }
            (Field::Integer(_) | Field::Timestamp, Value::Int(v)) => Ok(match scheme {
                IntScheme::SignMarker => sortable::encode_i64(*v),
                IntScheme::Offset => sortable::encode_i64_offset(*v),
            }),
            (Field::Float(_), Value::Float(v)) => {
                if !v.is_finite() {
                    return Err(ValidationError::new("must be a finite number"));
                }
                Ok(sortable::encode_f64(*v))
            }
            (Field::Decimal { places }, Value::Text(s)) => {
                let scaled = parse_scaled(s, *places)?;
                Ok(match scheme {
                    IntScheme::SignMarker => sortable::encode_i64(scaled),
                    IntScheme::Offset => sortable::encode_i64_offset(scaled),
                })
            }
            (Field::Binary, Value::Bytes(b)) => Ok(hex::encode(b)),
            (field, v) => field.encode(v),
        }
    }

    /// Reverse [`Field::encode_sortable`] and [`Field::encode_sortable_offset`]
    pub fn decode_sortable(&self, encoded: &str) -> Result<Value, ValidationError> {
        match self {
            Field::Nullable(_) if encoded.is_empty() => Ok(Value::Null),
            Field::Nullable(inner) => inner.decode_sortable(encoded),
            Field::List(inner) => split_list(encoded, |item| inner.decode_sortable(item)),
            Field::Integer(_) | Field::Timestamp => {
                self.validate(Value::Int(sortable::decode_i64(encoded)?))
            }
            Field::Float(_) => self.validate(Value::Float(sortable::decode_f64(encoded)?)),
            Field::Decimal { places } => {
                let scaled = sortable::decode_i64(encoded)?;
                self.validate(Value::Text(format_scaled(scaled, *places)?))
            }
            Field::Binary => hex::decode(encoded)
                .map(Value::Bytes)
                .map_err(|e| ValidationError::new(format!("invalid hex data: {}", e))),
            _ => self.decode(encoded),
        }
    }

    // =========================================================================
    // Decimal units
    // =========================================================================

    /// A decimal value as a whole number of its smallest unit (`"12.34"` with
    /// two places is `1234`)
    ///
    /// Exact for every value [`Field::validate`] accepts, and ordered like
    /// the decimals themselves.
    pub fn to_scaled(&self, value: &Value) -> Result<i64, ValidationError> {
        match (self.inner(), value) {
            (Field::Decimal { places }, Value::Text(s)) => parse_scaled(s, *places),
            (field, other) => Err(ValidationError::expected(field.kind(), other)),
        }
    }

    /// Reverse [`Field::to_scaled`]
    pub fn from_scaled(&self, scaled: i64) -> Result<Value, ValidationError> {
        match self.inner() {
            Field::Decimal { places } => format_scaled(scaled, *places).map(Value::Text),
            field => Err(ValidationError::new(format!(
                "{} has no scaled form",
                field.kind()
            ))),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn check_year(year: i32) -> Result<(), ValidationError> {
    if (1..=9999).contains(&year) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "year {} is outside 1..=9999",
            year
        )))
    }
}

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Fixed-width `YYYY-MM-DDTHH:MM:SS.ffffffZ`
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_bool(encoded: &str) -> Result<Value, ValidationError> {
    match encoded {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        other => Err(ValidationError::new(format!("'{}' is not a boolean", other))),
    }
}

fn parse_data_uri(uri: &str) -> Result<Vec<u8>, ValidationError> {
    let payload = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, data)| data)
        .ok_or_else(|| ValidationError::new("expected a base64 data URI"))?;
    STANDARD
        .decode(payload)
        .map_err(|_| ValidationError::new("invalid base64 payload in data URI"))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Every element is escaped and terminated, so `[]` and `[""]` stay distinct
fn join_list<F>(items: &[Value], mut encode: F) -> Result<String, ValidationError>
where
    F: FnMut(&Value) -> Result<String, ValidationError>,
{
    if items.is_empty() {
        return Ok(EMPTY_LIST.to_string());
    }
    let mut out = String::new();
    let mut errors = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match encode(item) {
            Ok(s) => {
                out.push_str(&escape(&s));
                out.push(LIST_TERMINATOR);
            }
            Err(e) => errors.push((PathSegment::Index(i), e)),
        }
    }
    if errors.is_empty() {
        Ok(out)
    } else {
        Err(ValidationError::composite("list contains invalid items", errors))
    }
}

fn split_list<F>(encoded: &str, mut decode: F) -> Result<Value, ValidationError>
where
    F: FnMut(&str) -> Result<Value, ValidationError>,
{
    if encoded == EMPTY_LIST {
        return Ok(Value::List(Vec::new()));
    }
    let body = encoded
        .strip_suffix(LIST_TERMINATOR)
        .ok_or_else(|| ValidationError::new("encoded list is not terminated"))?;
    let mut out = Vec::new();
    let mut errors = Vec::new();
    for (i, part) in body.split(LIST_TERMINATOR).enumerate() {
        match unescape(part).and_then(|s| decode(&s)) {
            Ok(v) => out.push(v),
            Err(e) => errors.push((PathSegment::Index(i), e)),
        }
    }
    if errors.is_empty() {
        Ok(Value::List(out))
    } else {
        Err(ValidationError::composite("list contains invalid items", errors))
    }
}

fn decimal_scale(places: u32) -> Result<i64, ValidationError> {
    if places > MAX_DECIMAL_PLACES {
        return Err(ValidationError::new(format!(
            "decimal precision {} exceeds {}",
            places, MAX_DECIMAL_PLACES
        )));
    }
    Ok(10i64.pow(places))
}

/// Parse `[-]digits[.digits]` into an integer scaled by `10^places`
fn parse_scaled(input: &str, places: u32) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::new(format!("'{}' is not a decimal number", input));
    let scale = decimal_scale(places)?;

    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let (whole, fraction) = match body.split_once('.') {
        Some((w, f)) => (w, f),
        None => (body, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if body.contains('.') && fraction.is_empty() {
        return Err(invalid());
    }
    if fraction.len() > places as usize {
        return Err(ValidationError::new(format!(
            "'{}' has more than {} decimal places",
            input, places
        )));
    }

    let overflow = || ValidationError::new(format!("'{}' is out of range", input));
    let whole: i64 = whole.parse().map_err(|_| overflow())?;
    let padded = format!("{:0<width$}", fraction, width = places as usize);
    let fraction: i64 = if padded.is_empty() {
        0
    } else {
        padded.parse().map_err(|_| invalid())?
    };
    let magnitude = whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(overflow)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn format_scaled(value: i64, places: u32) -> Result<String, ValidationError> {
    let scale = decimal_scale(places)? as u64;
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let whole = magnitude / scale;
    if places == 0 {
        return Ok(format!("{}{}", sign, whole));
    }
    let fraction = magnitude % scale;
    Ok(format!(
        "{}{}.{:0width$}",
        sign,
        whole,
        fraction,
        width = places as usize
    ))
}

//! Store-assigned version values
//!
//! Every successful mutation gives the record a fresh value in its version
//! field. The caller never chooses it. Which kind of value is produced
//! depends on the version field's codec:
//!
//! - **Integer / Timestamp**: epoch milliseconds, bumped past the previous value
//! - **DateTime**: now at microsecond precision, bumped past the previous value
//! - **Text / Trimmed / Id / Uuid**: random UUID v4
//! - **Ulid**: fresh ULID
//!
//! Other kinds cannot serve as version fields.

use crate::field::{new_ulid, Field, Pattern};
use crate::value::Value;
use chrono::{Duration, SubsecRound, Utc};

/// True if [`next_version`] can produce values for this field
pub fn can_generate(field: &Field) -> bool {
    matches!(
        field,
        Field::Integer(_)
            | Field::Timestamp
            | Field::DateTime
            | Field::Text
            | Field::Trimmed
            | Field::Pattern(Pattern::Id | Pattern::Uuid | Pattern::Ulid)
    )
}

/// Produce the version value for the next write
///
/// `previous` is the version the caller or the store last saw, if any.
/// Returns `None` for kinds rejected by [`can_generate`].
pub fn next_version(field: &Field, previous: Option<&Value>) -> Option<Value> {
    match field {
        Field::Integer(_) | Field::Timestamp => {
            let now = Utc::now().timestamp_millis();
            let next = match previous {
                Some(Value::Int(prev)) if *prev >= now => prev.saturating_add(1),
                _ => now,
            };
            Some(Value::Int(next))
        }
        Field::DateTime => {
            let now = Utc::now().trunc_subsecs(6);
            let next = match previous {
                Some(Value::DateTime(prev)) if *prev >= now => *prev + Duration::microseconds(1),
                _ => now,
            };
            Some(Value::DateTime(next))
        }
        Field::Text | Field::Trimmed | Field::Pattern(Pattern::Id | Pattern::Uuid) => {
            Some(Value::Text(uuid::Uuid::new_v4().hyphenated().to_string()))
        }
        Field::Pattern(Pattern::Ulid) => Some(Value::Text(new_ulid())),
        _ => None,
    }
}

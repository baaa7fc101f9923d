//! List queries and result pages
//!
//! A [`Query`] names an ordering field, a direction, equality / membership
//! filters and an optional `since` cursor. `since` is always the sortable
//! encoding of the ordering field, so a cursor produced by one backend can be
//! handed to another.

use crate::value::{Record, Value};
use serde::{Deserialize, Serialize};

/// Sort direction of a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

impl Direction {
    /// `asc` or `desc`
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Predicate on a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value; `Null` matches missing/null values
    Eq(Value),
    /// Field equals any of the values; an empty set matches nothing
    In(Vec<Value>),
}

/// Ordered, filtered, resumable list request
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// `(field, predicate)` pairs, all of which must hold
    pub filters: Vec<(String, Filter)>,
    /// Field the results are sorted by
    pub ordering: String,
    /// Sort direction
    pub direction: Direction,
    /// Sortable-encoded ordering value to resume after
    pub since: Option<String>,
}

impl Query {
    /// Ascending query over `ordering` with no filters
    pub fn new(ordering: impl Into<String>) -> Self {
        Self {
            filters: Vec::new(),
            ordering: ordering.into(),
            direction: Direction::Asc,
            since: None,
        }
    }

    /// Set the direction
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sort descending
    pub fn descending(self) -> Self {
        self.direction(Direction::Desc)
    }

    /// Add an equality filter
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((name.into(), Filter::Eq(value.into())));
        self
    }

    /// Add a membership filter
    pub fn any_of<V: Into<Value>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push((name.into(), Filter::In(values)));
        self
    }

    /// Resume after the given sortable-encoded ordering value
    pub fn since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }
}

/// One page of list results
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Results in query order
    pub results: Vec<Record>,
    /// Query for the following page; `None` when no more results exist
    pub next: Option<Query>,
}

impl Page {
    /// A final page with no results
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            next: None,
        }
    }
}

/// A query whose filter values and cursor have been validated against a resource
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// Validated filters
    pub filters: Vec<(String, Filter)>,
    /// Ordering field
    pub ordering: String,
    /// Sort direction
    pub direction: Direction,
    /// Decoded `since` value
    pub since: Option<Value>,
}

impl PreparedQuery {
    /// True if some membership filter has an empty set, so nothing can match
    pub fn matches_nothing(&self) -> bool {
        self.filters
            .iter()
            .any(|(_, f)| matches!(f, Filter::In(values) if values.is_empty()))
    }
}

//! Error types for vstore
//!
//! This module defines the error taxonomy shared by every backend.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Only `NotFound`, `AlreadyExists` and `PreconditionFailed` are expected to be
//! handled routinely by callers. Backend errors carry the driver's own error
//! as their source and are never swallowed.

use std::fmt;
use thiserror::Error;

/// Result type alias for vstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed backend error, kept intact so callers can downcast it
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for the versioned store
#[derive(Debug, Error)]
pub enum Error {
    /// A value or record failed field validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The identity predicate matched nothing
    #[error("{resource} not found: {identity}")]
    NotFound {
        /// Resource name
        resource: String,
        /// Encoded identity that was looked up
        identity: String,
    },

    /// A record with the same identity already exists
    #[error("{resource} already exists: {identity}")]
    AlreadyExists {
        /// Resource name
        resource: String,
        /// Encoded identity of the existing record
        identity: String,
    },

    /// A conditional write lost against a concurrent writer
    #[error("Precondition failed for {resource} {identity}: {reason}")]
    PreconditionFailed {
        /// Resource name
        resource: String,
        /// Encoded identity of the contested record
        identity: String,
        /// What the backend refused
        reason: String,
    },

    /// Invalid schema, resource or store configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport or driver failure, propagated unchanged
    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),
}

impl Error {
    /// Wrap a driver error
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backend(Box::new(err))
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for `AlreadyExists` and `PreconditionFailed`
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::AlreadyExists { .. } | Error::PreconditionFailed { .. }
        )
    }

    /// True for `Validation`
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Location of a nested validation failure inside a composite value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Position inside a list
    Index(usize),
    /// Field name inside a record
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Key(k) => write!(f, "{}", k),
        }
    }
}

/// Field codec validation failure
///
/// Scalar fields produce a bare message. Lists and records collect the
/// failures of their members under `nested`, keyed by index or field name.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable summary
    pub message: String,
    /// Per-index or per-key failures of a composite value
    pub nested: Vec<(PathSegment, ValidationError)>,
}

impl ValidationError {
    /// Create a scalar validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            nested: Vec::new(),
        }
    }

    /// Create a composite validation error from member failures
    pub fn composite(
        message: impl Into<String>,
        nested: Vec<(PathSegment, ValidationError)>,
    ) -> Self {
        Self {
            message: message.into(),
            nested,
        }
    }

    /// Shorthand for a type mismatch
    pub fn expected(kind: &str, found: &crate::value::Value) -> Self {
        Self::new(format!("expected {}, got {}", kind, found.type_name()))
    }

    /// Flatten nested failures into `path: message` lines
    ///
    /// A composite error with no nested members yields its own message.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<String>) {
        if self.nested.is_empty() {
            if prefix.is_empty() {
                out.push(self.message.clone());
            } else {
                out.push(format!("{}: {}", prefix, self.message));
            }
            return;
        }
        for (segment, err) in &self.nested {
            let path = match (prefix.is_empty(), segment) {
                (true, _) => segment.to_string(),
                (false, PathSegment::Index(_)) => format!("{}{}", prefix, segment),
                (false, PathSegment::Key(_)) => format!("{}.{}", prefix, segment),
            };
            err.flatten_into(&path, out);
        }
    }
}

//! Relational backend errors
//!
//! Every variant converts into `vstore_core::Error::Backend`, keeping the
//! `SqlError` as the boxed source so callers can downcast to it.

use thiserror::Error;
use vstore_core::ValidationError;

/// Errors raised by the relational backend and its drivers
#[derive(Debug, Error)]
pub enum SqlError {
    /// The SQLite driver rejected a statement or failed to run it
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored column could not be read back through its field codec
    #[error("Cannot decode column '{column}': {source}")]
    Decode {
        /// Column name
        column: String,
        /// Codec failure
        #[source]
        source: ValidationError,
    },

    /// A value could not be mapped to a column
    #[error("Cannot encode column '{column}': {source}")]
    Encode {
        /// Column name
        column: String,
        /// Codec failure
        #[source]
        source: ValidationError,
    },

    /// A driver returned a value of a type the backend does not understand
    #[error("Unsupported column value in '{column}': {message}")]
    Unsupported {
        /// Column name
        column: String,
        /// Details
        message: String,
    },

    /// A blocking driver task panicked or was cancelled
    #[error("Driver task failed: {0}")]
    Task(String),
}

impl From<SqlError> for vstore_core::Error {
    fn from(err: SqlError) -> Self {
        vstore_core::Error::backend(err)
    }
}

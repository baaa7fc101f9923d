//! Attribute-store errors

use thiserror::Error;
use vstore_core::ValidationError;

/// Errors raised by attribute-store clients and the store's item mapping
#[derive(Debug, Error)]
pub enum AttrError {
    /// An `Expected` condition did not hold at write time
    #[error("Conditional check failed on item '{item}' for attribute '{attribute}'")]
    ConditionalCheckFailed {
        /// Item name
        item: String,
        /// Attribute named by the condition
        attribute: String,
    },

    /// The domain does not exist
    #[error("No such domain: {0}")]
    NoSuchDomain(String),

    /// A select expression could not be parsed
    #[error("Invalid query expression: {0}")]
    InvalidQuery(String),

    /// A continuation token was not issued by this client
    #[error("Invalid next token: {0}")]
    InvalidNextToken(String),

    /// A stored attribute could not be read back through its field codec
    #[error("Cannot decode attribute '{attribute}' of item '{item}': {source}")]
    Decode {
        /// Item name
        item: String,
        /// Attribute name
        attribute: String,
        /// Codec failure
        #[source]
        source: ValidationError,
    },

    /// A value could not be encoded for storage
    #[error("Cannot encode attribute '{attribute}': {source}")]
    Encode {
        /// Attribute name
        attribute: String,
        /// Codec failure
        #[source]
        source: ValidationError,
    },

    /// Network or service failure reported by a remote client
    #[error("Transport error: {0}")]
    Transport(String),
}

impl AttrError {
    /// True for a failed `Expected` condition
    pub fn is_condition_failure(&self) -> bool {
        matches!(self, AttrError::ConditionalCheckFailed { .. })
    }
}

impl From<AttrError> for vstore_core::Error {
    fn from(err: AttrError) -> Self {
        vstore_core::Error::backend(err)
    }
}

//! Attribute-store capability trait
//!
//! A domain holds named items; an item holds flat string attributes. Writes
//! may carry one [`Expected`] condition that the service checks atomically.
//! `select` runs the restricted query language and pages with opaque
//! continuation tokens.

use crate::error::AttrError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Attributes of one item
pub type Attributes = BTreeMap<String, String>;

/// Condition attached to a put or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    /// Attribute to check
    pub name: String,
    /// Required current value; `None` requires the attribute to be absent
    pub value: Option<String>,
}

impl Expected {
    /// The attribute must not exist
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// The attribute must currently equal `value`
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Evaluate against an item's current attributes (`None` = no item)
    pub fn holds(&self, current: Option<&Attributes>) -> bool {
        let actual = current.and_then(|attrs| attrs.get(&self.name));
        match (&self.value, actual) {
            (None, None) => true,
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// One page of select results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOutput {
    /// `(item name, attributes)` in result order
    pub items: Vec<(String, Attributes)>,
    /// Token for the following page, if any
    pub next_token: Option<String>,
}

/// The operations the store needs from an attribute-store service
#[async_trait]
pub trait AttributeClient: Send + Sync {
    /// Create a domain; succeeds if it already exists
    async fn create_domain(&self, domain: &str) -> Result<(), AttrError>;

    /// Attributes of an item, or `None` if the item has none
    async fn get_attributes(
        &self,
        domain: &str,
        item: &str,
        consistent_read: bool,
    ) -> Result<Option<Attributes>, AttrError>;

    /// Replace an item's attributes, subject to an optional condition
    async fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        attributes: &Attributes,
        expected: Option<&Expected>,
    ) -> Result<(), AttrError>;

    /// Delete an item, subject to an optional condition
    async fn delete_attributes(
        &self,
        domain: &str,
        item: &str,
        expected: Option<&Expected>,
    ) -> Result<(), AttrError>;

    /// Run a select expression, resuming from `next_token`
    async fn select(
        &self,
        expression: &str,
        next_token: Option<&str>,
        consistent_read: bool,
    ) -> Result<SelectOutput, AttrError>;
}

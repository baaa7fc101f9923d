//! Select expression builder
//!
//! Produces expressions in the service's restricted query language:
//! identifiers in backticks, values in single quotes, conditions joined
//! with `and`. Embedded quote characters are doubled.

use vstore_core::Direction;

/// One `where` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `` `a` = 'v' ``
    Eq(String, String),
    /// `` `a` != 'v' ``
    NotEq(String, String),
    /// `` `a` in ('v1', 'v2') ``
    In(String, Vec<String>),
    /// `` `a` is not null ``
    IsNotNull(String),
    /// `` `a` > 'v' ``
    Greater(String, String),
    /// `` `a` < 'v' ``
    Less(String, String),
}

/// Quote an attribute or domain name
pub fn quote_name(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a value literal
pub fn quote_value(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Builder for `select * from ...`
#[derive(Debug, Clone)]
pub struct Select {
    domain: String,
    conditions: Vec<Condition>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Select {
    /// All attributes of every item in `domain`
    pub fn from(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            conditions: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Add a condition
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sort by an attribute
    pub fn order_by(mut self, name: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((name.into(), direction));
        self
    }

    /// Maximum items per response
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the expression
    pub fn build(&self) -> String {
        let mut out = format!("select * from {}", quote_name(&self.domain));
        for (i, condition) in self.conditions.iter().enumerate() {
            out.push_str(if i == 0 { " where " } else { " and " });
            render(&mut out, condition);
        }
        if let Some((name, direction)) = &self.order {
            out.push_str(" order by ");
            out.push_str(&quote_name(name));
            out.push(' ');
            out.push_str(direction.as_str());
        }
        if let Some(limit) = self.limit {
            out.push_str(&format!(" limit {}", limit));
        }
        out
    }
}

fn render(out: &mut String, condition: &Condition) {
    match condition {
        Condition::Eq(name, value) => binary(out, name, "=", value),
        Condition::NotEq(name, value) => binary(out, name, "!=", value),
        Condition::Greater(name, value) => binary(out, name, ">", value),
        Condition::Less(name, value) => binary(out, name, "<", value),
        Condition::IsNotNull(name) => {
            out.push_str(&quote_name(name));
            out.push_str(" is not null");
        }
        Condition::In(name, values) => {
            out.push_str(&quote_name(name));
            out.push_str(" in (");
            let quoted: Vec<String> = values.iter().map(|v| quote_value(v)).collect();
            out.push_str(&quoted.join(", "));
            out.push(')');
        }
    }
}

fn binary(out: &mut String, name: &str, op: &str, value: &str) {
    out.push_str(&quote_name(name));
    out.push(' ');
    out.push_str(op);
    out.push(' ');
    out.push_str(&quote_value(value));
}

//! In-process attribute store
//!
//! Implements [`AttributeClient`] over nested maps and evaluates the subset
//! of the select language that [`crate::select::Select`] emits. Reads are
//! always consistent. Responses can be capped below the requested `limit`
//! to exercise continuation tokens.

use crate::client::{AttributeClient, Attributes, Expected, SelectOutput};
use crate::error::AttrError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::trace;
use vstore_core::Direction;

/// Items per response when the expression has no `limit`
const DEFAULT_LIMIT: usize = 100;

type Domain = BTreeMap<String, Attributes>;

/// [`AttributeClient`] backed by memory
#[derive(Debug, Default)]
pub struct MemoryAttributeClient {
    domains: Mutex<BTreeMap<String, Domain>>,
    max_items_per_response: Option<usize>,
}

impl MemoryAttributeClient {
    /// Empty client with no domains
    pub fn new() -> Self {
        Self::default()
    }

    /// Return at most `max` items per select response regardless of `limit`
    pub fn with_max_items_per_response(mut self, max: usize) -> Self {
        self.max_items_per_response = Some(max.max(1));
        self
    }

    /// Number of items in `domain` (0 if it does not exist)
    pub fn item_count(&self, domain: &str) -> usize {
        self.domains.lock().get(domain).map_or(0, BTreeMap::len)
    }
}

fn domain_mut<'a>(
    domains: &'a mut BTreeMap<String, Domain>,
    domain: &str,
) -> Result<&'a mut Domain, AttrError> {
    domains
        .get_mut(domain)
        .ok_or_else(|| AttrError::NoSuchDomain(domain.to_string()))
}

fn check(item: &str, expected: Option<&Expected>, current: Option<&Attributes>) -> Result<(), AttrError> {
    match expected {
        Some(expected) if !expected.holds(current) => Err(AttrError::ConditionalCheckFailed {
            item: item.to_string(),
            attribute: expected.name.clone(),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl AttributeClient for MemoryAttributeClient {
    async fn create_domain(&self, domain: &str) -> Result<(), AttrError> {
        self.domains.lock().entry(domain.to_string()).or_default();
        Ok(())
    }

    async fn get_attributes(
        &self,
        domain: &str,
        item: &str,
        _consistent_read: bool,
    ) -> Result<Option<Attributes>, AttrError> {
        let mut domains = self.domains.lock();
        let items = domain_mut(&mut domains, domain)?;
        Ok(items.get(item).cloned())
    }

    async fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        attributes: &Attributes,
        expected: Option<&Expected>,
    ) -> Result<(), AttrError> {
        let mut domains = self.domains.lock();
        let items = domain_mut(&mut domains, domain)?;
        check(item, expected, items.get(item))?;
        items.insert(item.to_string(), attributes.clone());
        Ok(())
    }

    async fn delete_attributes(
        &self,
        domain: &str,
        item: &str,
        expected: Option<&Expected>,
    ) -> Result<(), AttrError> {
        let mut domains = self.domains.lock();
        let items = domain_mut(&mut domains, domain)?;
        check(item, expected, items.get(item))?;
        items.remove(item);
        Ok(())
    }

    async fn select(
        &self,
        expression: &str,
        next_token: Option<&str>,
        _consistent_read: bool,
    ) -> Result<SelectOutput, AttrError> {
        let parsed = Parser::new(tokenize(expression)?).parse()?;
        let offset = match next_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| AttrError::InvalidNextToken(token.to_string()))?,
        };

        let mut domains = self.domains.lock();
        let items = domain_mut(&mut domains, &parsed.domain)?;
        let mut matched: Vec<(&String, &Attributes)> = items
            .iter()
            .filter(|(_, attrs)| parsed.conditions.iter().all(|c| c.holds(attrs)))
            .collect();

        if let Some((name, direction)) = &parsed.order {
            matched.sort_by(|(a_name, a), (b_name, b)| {
                (a.get(name), a_name).cmp(&(b.get(name), b_name))
            });
            if *direction == Direction::Desc {
                matched.reverse();
            }
        }

        let mut per_response = parsed.limit.unwrap_or(DEFAULT_LIMIT);
        if let Some(max) = self.max_items_per_response {
            per_response = per_response.min(max);
        }
        let end = matched.len().min(offset.saturating_add(per_response));
        let items: Vec<(String, Attributes)> = matched
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|(name, attrs)| ((*name).clone(), (*attrs).clone()))
            .collect();
        let next_token = (end < matched.len()).then(|| end.to_string());

        trace!(
            target: "vstore::attr",
            expression,
            offset,
            returned = items.len(),
            more = next_token.is_some(),
            "Evaluated select"
        );
        Ok(SelectOutput { items, next_token })
    }
}

// =============================================================================
// Expression parsing
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Literal(String),
    Word(String),
    Op(&'static str),
    Star,
    Comma,
    Open,
    Close,
}

#[derive(Debug)]
enum Cond {
    Compare(String, &'static str, String),
    In(String, Vec<String>),
    Null { name: String, negated: bool },
}

impl Cond {
    fn name(&self) -> &str {
        match self {
            Cond::Compare(name, _, _) | Cond::In(name, _) | Cond::Null { name, .. } => name.as_str(),
        }
    }

    fn holds(&self, attrs: &Attributes) -> bool {
        match self {
            Cond::Null { name, negated } => attrs.contains_key(name) == *negated,
            Cond::In(name, values) => attrs.get(name).is_some_and(|v| values.contains(v)),
            Cond::Compare(name, op, value) => attrs.get(name).is_some_and(|v| match *op {
                "=" => v == value,
                "!=" => v != value,
                ">" => v > value,
                ">=" => v >= value,
                "<" => v < value,
                _ => v <= value,
            }),
        }
    }
}

#[derive(Debug)]
struct Parsed {
    domain: String,
    conditions: Vec<Cond>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, AttrError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '`' | '\'' => {
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => {
                            if chars.peek() == Some(&c) {
                                chars.next();
                                text.push(c);
                            } else {
                                break;
                            }
                        }
                        Some(other) => text.push(other),
                        None => {
                            return Err(AttrError::InvalidQuery(format!(
                                "unterminated {} in '{}'",
                                if c == '`' { "name" } else { "literal" },
                                expression
                            )))
                        }
                    }
                }
                tokens.push(if c == '`' {
                    Token::Name(text)
                } else {
                    Token::Literal(text)
                });
            }
            '*' => tokens.push(Token::Star),
            ',' => tokens.push(Token::Comma),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '=' => tokens.push(Token::Op("=")),
            '!' if chars.peek() == Some(&'=') => {
                chars.next();
                tokens.push(Token::Op("!="));
            }
            '>' | '<' => {
                let eq = chars.peek() == Some(&'=');
                if eq {
                    chars.next();
                }
                tokens.push(Token::Op(match (c, eq) {
                    ('>', false) => ">",
                    ('>', true) => ">=",
                    ('<', false) => "<",
                    _ => "<=",
                }));
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word.to_ascii_lowercase()));
            }
            other => {
                return Err(AttrError::InvalidQuery(format!(
                    "unexpected '{}' in '{}'",
                    other, expression
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: &str) -> AttrError {
        AttrError::InvalidQuery(format!("{} at token {}", message, self.pos))
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn expect_word(&mut self, word: &str) -> Result<(), AttrError> {
        if self.at_word(word) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", word)))
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), AttrError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", token)))
        }
    }

    fn name(&mut self) -> Result<String, AttrError> {
        match self.advance() {
            Some(Token::Name(name)) | Some(Token::Word(name)) => Ok(name),
            _ => Err(self.error("expected a name")),
        }
    }

    fn literal(&mut self) -> Result<String, AttrError> {
        match self.advance() {
            Some(Token::Literal(value)) => Ok(value),
            _ => Err(self.error("expected a quoted value")),
        }
    }

    fn parse(mut self) -> Result<Parsed, AttrError> {
        self.expect_word("select")?;
        self.expect(Token::Star)?;
        self.expect_word("from")?;
        let domain = self.name()?;

        let mut conditions = Vec::new();
        if self.at_word("where") {
            self.pos += 1;
            loop {
                conditions.push(self.condition()?);
                if self.at_word("and") {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }

        let mut order = None;
        if self.at_word("order") {
            self.pos += 1;
            self.expect_word("by")?;
            let name = self.name()?;
            let direction = if self.at_word("desc") {
                self.pos += 1;
                Direction::Desc
            } else {
                if self.at_word("asc") {
                    self.pos += 1;
                }
                Direction::Asc
            };
            if !conditions.iter().any(|c| c.name() == name) {
                return Err(AttrError::InvalidQuery(format!(
                    "sort attribute '{}' must appear in a predicate",
                    name
                )));
            }
            order = Some((name, direction));
        }

        let mut limit = None;
        if self.at_word("limit") {
            self.pos += 1;
            limit = match self.advance() {
                Some(Token::Word(n)) => n.parse::<usize>().ok().filter(|n| *n > 0),
                _ => None,
            };
            if limit.is_none() {
                return Err(self.error("expected a positive limit"));
            }
        }

        if self.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(Parsed {
            domain,
            conditions,
            order,
            limit,
        })
    }

    fn condition(&mut self) -> Result<Cond, AttrError> {
        let name = self.name()?;
        match self.advance() {
            Some(Token::Op(op)) => Ok(Cond::Compare(name, op, self.literal()?)),
            Some(Token::Word(w)) if w == "is" => {
                let negated = self.at_word("not");
                if negated {
                    self.pos += 1;
                }
                self.expect_word("null")?;
                Ok(Cond::Null { name, negated })
            }
            Some(Token::Word(w)) if w == "in" => {
                self.expect(Token::Open)?;
                let mut values = vec![self.literal()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    values.push(self.literal()?);
                }
                self.expect(Token::Close)?;
                Ok(Cond::In(name, values))
            }
            _ => Err(self.error("expected a comparison")),
        }
    }
}

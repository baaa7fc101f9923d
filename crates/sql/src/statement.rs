//! Parameterized statement builder
//!
//! Builds the small SQL subset the store needs. Identifiers are always
//! double-quoted with embedded quotes doubled; values are always bound as
//! `$n` parameters, numbered in order of appearance.
//!
//! ## Generated shapes
//!
//! ```text
//! SELECT * FROM "t" WHERE ... ORDER BY "o" ASC LIMIT $n
//! INSERT INTO "t" ("a", "b") VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *
//! INSERT INTO "t" (...) VALUES (...) ON CONFLICT ("k") DO UPDATE SET ... RETURNING *
//! UPDATE "t" SET "a" = $1 WHERE "k" = $2 RETURNING *
//! DELETE FROM "t" WHERE "k" = $1
//! ```

use crate::value::SqlValue;
use vstore_core::Direction;

/// SQL text plus its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL with `$1..$n` placeholders
    pub text: String,
    /// Parameter values, `params[i]` binds `$(i + 1)`
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Statement without parameters
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }
}

/// Quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A `WHERE` conjunct
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `"c" = $n`, or `"c" IS NULL` for a null value
    Eq(String, SqlValue),
    /// `"c" IN ($n, ...)`; an empty list becomes `FALSE`
    In(String, Vec<SqlValue>),
    /// `"c" IS NOT NULL`
    NotNull(String),
    /// `"c" > $n`
    Greater(String, SqlValue),
    /// `"c" < $n`
    Less(String, SqlValue),
}

/// A `SET` clause entry
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `"c" = $n`
    Value(String, SqlValue),
    /// `"c" = excluded."c"` inside `ON CONFLICT DO UPDATE`
    Excluded(String),
    /// Integer version bump: `"c" = CASE WHEN "c" >= $n THEN "c" + 1 ELSE $n END`
    Advance(String, SqlValue),
}

/// What an `INSERT` does when the key already exists
#[derive(Debug, Clone, PartialEq)]
pub enum OnConflict {
    /// Let the driver raise a constraint error
    Fail,
    /// Skip the row; `RETURNING` yields nothing
    DoNothing,
    /// Update the existing row
    DoUpdate {
        /// Conflict target columns (the primary key)
        target: Vec<String>,
        /// Assignments applied to the existing row
        set: Vec<Assignment>,
    },
}

/// Accumulates SQL text and numbers parameters as they are pushed
#[derive(Debug, Default)]
struct Writer {
    text: String,
    params: Vec<SqlValue>,
}

impl Writer {
    fn push(&mut self, sql: &str) {
        self.text.push_str(sql);
    }

    fn bind(&mut self, value: SqlValue) {
        self.params.push(value);
        self.text.push('$');
        self.text.push_str(&self.params.len().to_string());
    }

    fn ident(&mut self, name: &str) {
        self.text.push_str(&quote_ident(name));
    }

    fn predicates(&mut self, predicates: &[Predicate]) {
        if predicates.is_empty() {
            return;
        }
        self.push(" WHERE ");
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            match predicate {
                Predicate::Eq(column, SqlValue::Null) => {
                    self.ident(column);
                    self.push(" IS NULL");
                }
                Predicate::Eq(column, value) => {
                    self.ident(column);
                    self.push(" = ");
                    self.bind(value.clone());
                }
                Predicate::In(_, values) if values.is_empty() => self.push("FALSE"),
                Predicate::In(column, values) => {
                    self.ident(column);
                    self.push(" IN (");
                    for (j, value) in values.iter().enumerate() {
                        if j > 0 {
                            self.push(", ");
                        }
                        self.bind(value.clone());
                    }
                    self.push(")");
                }
                Predicate::NotNull(column) => {
                    self.ident(column);
                    self.push(" IS NOT NULL");
                }
                Predicate::Greater(column, value) => {
                    self.ident(column);
                    self.push(" > ");
                    self.bind(value.clone());
                }
                Predicate::Less(column, value) => {
                    self.ident(column);
                    self.push(" < ");
                    self.bind(value.clone());
                }
            }
        }
    }

    fn assignments(&mut self, set: &[Assignment]) {
        for (i, assignment) in set.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            match assignment {
                Assignment::Value(column, value) => {
                    self.ident(column);
                    self.push(" = ");
                    self.bind(value.clone());
                }
                Assignment::Excluded(column) => {
                    self.ident(column);
                    self.push(" = excluded.");
                    self.ident(column);
                }
                Assignment::Advance(column, value) => {
                    self.ident(column);
                    self.push(" = CASE WHEN ");
                    self.ident(column);
                    self.push(" >= ");
                    self.bind(value.clone());
                    self.push(" THEN ");
                    self.ident(column);
                    self.push(" + 1 ELSE ");
                    self.bind(value.clone());
                    self.push(" END");
                }
            }
        }
    }

    fn returning(&mut self, returning: bool) {
        if returning {
            self.push(" RETURNING *");
        }
    }

    fn finish(self) -> Statement {
        Statement {
            text: self.text,
            params: self.params,
        }
    }
}

/// `SELECT *` with optional ordering and limit
pub fn select(
    table: &str,
    predicates: &[Predicate],
    order: Option<(&str, Direction)>,
    limit: Option<usize>,
) -> Statement {
    let mut w = Writer::default();
    w.push("SELECT * FROM ");
    w.ident(table);
    w.predicates(predicates);
    if let Some((column, direction)) = order {
        w.push(" ORDER BY ");
        w.ident(column);
        w.push(match direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
    }
    if let Some(limit) = limit {
        w.push(" LIMIT ");
        w.bind(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }
    w.finish()
}

/// `INSERT` of one row
pub fn insert(
    table: &str,
    columns: &[(String, SqlValue)],
    on_conflict: &OnConflict,
    returning: bool,
) -> Statement {
    let mut w = Writer::default();
    w.push("INSERT INTO ");
    w.ident(table);
    w.push(" (");
    for (i, (column, _)) in columns.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.ident(column);
    }
    w.push(") VALUES (");
    for (i, (_, value)) in columns.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.bind(value.clone());
    }
    w.push(")");
    match on_conflict {
        OnConflict::Fail => {}
        OnConflict::DoNothing => w.push(" ON CONFLICT DO NOTHING"),
        OnConflict::DoUpdate { target, set } => {
            w.push(" ON CONFLICT (");
            for (i, column) in target.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.ident(column);
            }
            w.push(") DO UPDATE SET ");
            w.assignments(set);
        }
    }
    w.returning(returning);
    w.finish()
}

/// `UPDATE` guarded by predicates
pub fn update(table: &str, set: &[Assignment], predicates: &[Predicate], returning: bool) -> Statement {
    let mut w = Writer::default();
    w.push("UPDATE ");
    w.ident(table);
    w.push(" SET ");
    w.assignments(set);
    w.predicates(predicates);
    w.returning(returning);
    w.finish()
}

/// `DELETE` guarded by predicates
pub fn delete(table: &str, predicates: &[Predicate], returning: bool) -> Statement {
    let mut w = Writer::default();
    w.push("DELETE FROM ");
    w.ident(table);
    w.predicates(predicates);
    w.returning(returning);
    w.finish()
}

/// `CREATE TABLE IF NOT EXISTS` with a composite primary key
///
/// `columns` are `(name, type, nullable)`.
pub fn create_table(table: &str, columns: &[(String, &str, bool)], primary_key: &[String]) -> Statement {
    let mut w = Writer::default();
    w.push("CREATE TABLE IF NOT EXISTS ");
    w.ident(table);
    w.push(" (");
    for (column, column_type, nullable) in columns {
        w.ident(column);
        w.push(" ");
        w.push(column_type);
        if !nullable {
            w.push(" NOT NULL");
        }
        w.push(", ");
    }
    w.push("PRIMARY KEY (");
    for (i, column) in primary_key.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.ident(column);
    }
    w.push("))");
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_select_with_filters() {
        let stmt = select(
            "people",
            &[
                Predicate::NotNull("rank".to_string()),
                Predicate::Eq("team".to_string(), text("red")),
                Predicate::Eq("manager".to_string(), SqlValue::Null),
                Predicate::In("role".to_string(), vec![text("a"), text("b")]),
                Predicate::Greater("rank".to_string(), SqlValue::Integer(10)),
            ],
            Some(("rank", Direction::Asc)),
            Some(100),
        );
        assert_eq!(
            stmt.text,
            "SELECT * FROM \"people\" WHERE \"rank\" IS NOT NULL AND \"team\" = $1 \
             AND \"manager\" IS NULL AND \"role\" IN ($2, $3) AND \"rank\" > $4 \
             ORDER BY \"rank\" ASC LIMIT $5"
        );
        assert_eq!(stmt.params.len(), 5);
        assert_eq!(stmt.params[4], SqlValue::Integer(100));
    }

    #[test]
    fn test_empty_in_is_false() {
        let stmt = select(
            "t",
            &[Predicate::In("c".to_string(), vec![])],
            None,
            None,
        );
        assert_eq!(stmt.text, "SELECT * FROM \"t\" WHERE FALSE");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let hostile = "x'; DROP TABLE t; --";
        let stmt = update(
            "t",
            &[Assignment::Value("name".to_string(), text(hostile))],
            &[Predicate::Eq("id".to_string(), text(hostile))],
            true,
        );
        assert!(!stmt.text.contains("DROP"));
        assert_eq!(stmt.text, "UPDATE \"t\" SET \"name\" = $1 WHERE \"id\" = $2 RETURNING *");
    }

    #[test]
    fn test_insert_do_nothing() {
        let stmt = insert(
            "t",
            &[
                ("id".to_string(), text("a")),
                ("rev".to_string(), SqlValue::Integer(1)),
            ],
            &OnConflict::DoNothing,
            true,
        );
        assert_eq!(
            stmt.text,
            "INSERT INTO \"t\" (\"id\", \"rev\") VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *"
        );
    }

    #[test]
    fn test_insert_do_update() {
        let stmt = insert(
            "t",
            &[
                ("id".to_string(), text("a")),
                ("n".to_string(), SqlValue::Integer(1)),
                ("rev".to_string(), SqlValue::Integer(5)),
            ],
            &OnConflict::DoUpdate {
                target: vec!["id".to_string()],
                set: vec![
                    Assignment::Excluded("n".to_string()),
                    Assignment::Advance("rev".to_string(), SqlValue::Integer(5)),
                ],
            },
            true,
        );
        assert_eq!(
            stmt.text,
            "INSERT INTO \"t\" (\"id\", \"n\", \"rev\") VALUES ($1, $2, $3) \
             ON CONFLICT (\"id\") DO UPDATE SET \"n\" = excluded.\"n\", \
             \"rev\" = CASE WHEN \"rev\" >= $4 THEN \"rev\" + 1 ELSE $5 END RETURNING *"
        );
        assert_eq!(stmt.params.len(), 5);
    }

    #[test]
    fn test_delete_and_create_table() {
        let stmt = delete("t", &[Predicate::Eq("id".to_string(), text("a"))], false);
        assert_eq!(stmt.text, "DELETE FROM \"t\" WHERE \"id\" = $1");

        let ddl = create_table(
            "t",
            &[
                ("id".to_string(), "TEXT", false),
                ("note".to_string(), "TEXT", true),
            ],
            &["id".to_string()],
        );
        assert_eq!(
            ddl.text,
            "CREATE TABLE IF NOT EXISTS \"t\" (\"id\" TEXT NOT NULL, \"note\" TEXT, PRIMARY KEY (\"id\"))"
        );
    }
}

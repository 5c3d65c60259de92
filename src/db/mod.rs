//! Database connections and the uniform row model.
//!
//! Every driver (sqlite, postgres, mysql) surfaces query results as column
//! names plus JSON-valued rows, so dialect code reads results one way
//! regardless of the engine:
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │              SchemaConnection                  │
//! │   query(sql, params) -> QueryRows              │
//! └────────────────────────────────────────────────┘
//!          │               │              │
//!          ▼               ▼              ▼
//!     SqliteConnection PgConnection MysqlConnection
//!     (rusqlite)       (postgres)   (mysql)
//! ```
//!
//! Connections are handed out by [`ConnectionPool`]; the checkout guard
//! returns them on drop, so a connection is released on every exit path.

mod connection;
mod mysql_driver;
mod pool;
mod postgres_driver;
mod sqlite_driver;

pub use connection::{connect, connection_identity, SchemaConnection};
pub use mysql_driver::MysqlConnection;
pub use pool::{ConnectionPool, PooledConnection};
pub use postgres_driver::PgConnection;
pub use sqlite_driver::SqliteConnection;

use thiserror::Error;

/// The uniform cell type.
pub type Value = serde_json::Value;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DatabaseError>;

/// Driver error kept as a source for chaining.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from connecting and querying. All of these are recoverable per
/// model run; the batch runner records them and moves on.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The adapter string matched no known dialect.
    #[error("unsupported adapter '{adapter}' (expected one of: {expected})")]
    UnsupportedAdapter {
        adapter: String,
        expected: &'static str,
    },

    /// Could not establish a connection.
    #[error("connection failed for '{target}'")]
    ConnectionFailed {
        target: String,
        #[source]
        source: DriverError,
    },

    /// A catalog query failed.
    #[error("query failed: {context}")]
    QueryFailed {
        context: String,
        #[source]
        source: DriverError,
    },

    /// A result row did not have the shape the dialect expected.
    #[error("unexpected result shape: {0}")]
    UnexpectedShape(String),

    /// The pool mutex was poisoned by a panicking checkout.
    #[error("connection pool '{0}' is poisoned")]
    PoolPoisoned(String),
}

impl DatabaseError {
    /// Wrap a driver connect error.
    pub fn connection_failed(
        target: impl Into<String>,
        source: impl Into<DriverError>,
    ) -> Self {
        Self::ConnectionFailed {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Wrap a driver query error with the statement context.
    pub fn query_failed(context: impl Into<String>, source: impl Into<DriverError>) -> Self {
        Self::QueryFailed {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Flag a row that is missing a column or holds an unusable value.
    pub fn unexpected_shape(message: impl Into<String>) -> Self {
        Self::UnexpectedShape(message.into())
    }
}

/// First line of a statement, shortened, for error context.
pub(crate) fn statement_context(sql: &str) -> String {
    let line = sql.lines().next().unwrap_or("").trim();
    if line.len() > 80 {
        format!("{}...", &line[..80])
    } else {
        line.to_string()
    }
}

/// Column names plus rows of JSON values, in result order.
#[derive(Debug, Clone, Default)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows with column-name access.
    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |values| RowView {
            columns: &self.columns,
            values,
        })
    }

    /// View of the first row, if any.
    pub fn first(&self) -> Option<RowView<'_>> {
        self.iter().next()
    }
}

/// Column-name-wise access to one result row.
///
/// Accessors coerce across driver representations: the mysql driver returns
/// most cells as strings, sqlite returns integers for booleans, and catalog
/// columns like `IS_NULLABLE` come back as `YES`/`NO`.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    fn value(&self, column: &str) -> DbResult<&'a Value> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                DatabaseError::unexpected_shape(format!("missing column '{}'", column))
            })?;
        self.values.get(idx).ok_or_else(|| {
            DatabaseError::unexpected_shape(format!("row too short for column '{}'", column))
        })
    }

    /// Required text value.
    pub fn text(&self, column: &str) -> DbResult<String> {
        self.opt_text(column)?.ok_or_else(|| {
            DatabaseError::unexpected_shape(format!("null in required column '{}'", column))
        })
    }

    /// Optional text value; NULL becomes `None`.
    pub fn opt_text(&self, column: &str) -> DbResult<Option<String>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(DatabaseError::unexpected_shape(format!(
                "column '{}' is not scalar: {}",
                column, other
            ))),
        }
    }

    /// Required integer value. String cells are parsed.
    pub fn integer(&self, column: &str) -> DbResult<i64> {
        self.opt_integer(column)?.ok_or_else(|| {
            DatabaseError::unexpected_shape(format!("null in required column '{}'", column))
        })
    }

    /// Optional integer value.
    pub fn opt_integer(&self, column: &str) -> DbResult<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Number(n) => n.as_i64().map(Some).ok_or_else(|| {
                DatabaseError::unexpected_shape(format!("column '{}' is not an integer", column))
            }),
            Value::String(s) => s.trim().parse::<i64>().map(Some).map_err(|_| {
                DatabaseError::unexpected_shape(format!(
                    "column '{}' does not parse as an integer: '{}'",
                    column, s
                ))
            }),
            Value::Bool(b) => Ok(Some(i64::from(*b))),
            other => Err(DatabaseError::unexpected_shape(format!(
                "column '{}' is not numeric: {}",
                column, other
            ))),
        }
    }

    /// Required boolean value. Accepts engine spellings: `t`/`f`, `1`/`0`,
    /// `YES`/`NO`, `true`/`false`.
    pub fn boolean(&self, column: &str) -> DbResult<bool> {
        match self.value(column)? {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
            Value::Null => Ok(false),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "yes" | "y" | "on" => Ok(true),
                "f" | "false" | "0" | "no" | "n" | "off" | "" => Ok(false),
                other => Err(DatabaseError::unexpected_shape(format!(
                    "column '{}' is not boolean-like: '{}'",
                    column, other
                ))),
            },
            other => Err(DatabaseError::unexpected_shape(format!(
                "column '{}' is not boolean-like: {}",
                column, other
            ))),
        }
    }
}

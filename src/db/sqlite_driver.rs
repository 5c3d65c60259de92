//! rusqlite-backed connection.

use rusqlite::types::ValueRef;

use super::{statement_context, DatabaseError, DbResult, QueryRows, SchemaConnection, Value};

/// Connection to a SQLite database file (or `:memory:`).
pub struct SqliteConnection {
    adapter: String,
    identity: String,
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn open(label: &str, adapter: &str, url: &str, identity: String) -> DbResult<Self> {
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        let conn = if path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(|e| DatabaseError::connection_failed(label, e))?;
        Ok(Self {
            adapter: adapter.to_string(),
            identity,
            conn,
        })
    }

    /// Wrap an already-open rusqlite connection. Tests use this to build
    /// schemas in memory before reflecting them.
    pub fn from_connection(conn: rusqlite::Connection, identity: impl Into<String>) -> Self {
        Self {
            adapter: "sqlite3".to_string(),
            identity: identity.into(),
            conn,
        }
    }
}

impl SchemaConnection for SqliteConnection {
    fn adapter_name(&self) -> &str {
        &self.adapter
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<QueryRows> {
        let context = statement_context(sql);
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| DatabaseError::query_failed(&context, e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let bound: Vec<rusqlite::types::Value> = params.iter().map(to_sqlite_value).collect();
        let mut raw = stmt
            .query(rusqlite::params_from_iter(bound))
            .map_err(|e| DatabaseError::query_failed(&context, e))?;

        let mut rows = Vec::new();
        while let Some(row) = raw
            .next()
            .map_err(|e| DatabaseError::query_failed(&context, e))?
        {
            let mut cells = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let cell = row
                    .get_ref(idx)
                    .map_err(|e| DatabaseError::query_failed(&context, e))?;
                cells.push(cell_to_json(cell));
            }
            rows.push(cells);
        }
        Ok(QueryRows::new(columns, rows))
    }
}

fn to_sqlite_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                rusqlite::types::Value::Integer(i)
            } else {
                rusqlite::types::Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        other => rusqlite::types::Value::Text(other.to_string()),
    }
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

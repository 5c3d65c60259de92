//! The connection seam and the driver factory.

use sha2::{Digest, Sha256};

use super::{DbResult, QueryRows, Value};
use super::{MysqlConnection, PgConnection, SqliteConnection};
use crate::schema::{resolve_adapter, Dialect};

/// A live schema connection.
///
/// Dialects never see driver types; they issue SQL with the placeholder
/// style of their engine (`$1` for postgres, `?` elsewhere) and read the
/// uniform [`QueryRows`] result.
pub trait SchemaConnection: Send {
    /// Adapter spelling this connection was opened with.
    fn adapter_name(&self) -> &str;

    /// Stable identity for memo keys. Two connections to the same database
    /// share an identity; different databases never collide in practice.
    fn identity(&self) -> &str;

    /// Run a catalog query.
    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<QueryRows>;
}

impl std::fmt::Debug for dyn SchemaConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaConnection")
            .field("adapter", &self.adapter_name())
            .field("identity", &self.identity())
            .finish()
    }
}

/// Open a connection for the given adapter and resolved URL.
///
/// `label` names the connection in errors (the settings key, usually).
pub fn connect(label: &str, adapter: &str, url: &str) -> DbResult<Box<dyn SchemaConnection>> {
    let dialect = resolve_adapter(adapter)?;
    let identity = connection_identity(adapter, url);
    let conn: Box<dyn SchemaConnection> = match dialect {
        Dialect::Sqlite => Box::new(SqliteConnection::open(label, adapter, url, identity)?),
        Dialect::Postgres => Box::new(PgConnection::connect(label, adapter, url, identity)?),
        Dialect::MySql => Box::new(MysqlConnection::connect(label, adapter, url, identity)?),
    };
    Ok(conn)
}

/// Digest of the adapter and URL, shortened for readability in keys and
/// log lines. Deterministic across runs.
pub fn connection_identity(adapter: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(adapter.as_bytes());
    hasher.update(b"\0");
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = connection_identity("sqlite3", "db/app.sqlite3");
        let b = connection_identity("sqlite3", "db/app.sqlite3");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_identity_separates_adapter_and_url() {
        // The separator keeps ("ab", "c") and ("a", "bc") apart.
        assert_ne!(
            connection_identity("ab", "c"),
            connection_identity("a", "bc")
        );
        assert_ne!(
            connection_identity("postgres", "db"),
            connection_identity("mysql", "db")
        );
    }

    #[test]
    fn test_connect_rejects_unknown_adapter() {
        let err = connect("primary", "oracle", "oracle://x").unwrap_err();
        assert!(err.to_string().contains("unsupported adapter 'oracle'"));
    }
}

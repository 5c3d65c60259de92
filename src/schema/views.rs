//! View classification and existence caching.
//!
//! Whether a relation is a view is decided from view registries only;
//! a table whose name merely looks like a view is still a table. The
//! existence answer is cached per connection identity so repeated batch
//! runs against the same database do not re-query the catalog, while two
//! databases that happen to share table names never share cache entries.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::db::{DbResult, SchemaConnection};
use crate::schema::dialect::SchemaDialect;
use crate::schema::QualifiedName;

/// What kind of relation a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Table,
    View,
    MaterializedView,
}

/// Everything known about a view, or the absence of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub exists: bool,
    pub kind: ViewKind,
    pub updatable: bool,
    /// Relations the view reads from, sorted, when the engine exposes them.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// How a materialized view is refreshed, when known.
    #[serde(default)]
    pub refresh_strategy: Option<String>,
    /// Last refresh timestamp, when the engine records one.
    #[serde(default)]
    pub last_refreshed: Option<String>,
}

impl ViewDescriptor {
    /// The descriptor for a name that is not a view of any kind.
    pub fn absent() -> Self {
        ViewDescriptor {
            exists: false,
            kind: ViewKind::Table,
            updatable: false,
            dependencies: Vec::new(),
            refresh_strategy: None,
            last_refreshed: None,
        }
    }
}

/// Shared cache of view-existence answers, keyed by connection identity
/// and qualified name. Negative answers are cached too.
#[derive(Debug, Default)]
pub struct ViewExistenceCache {
    entries: DashMap<(String, String), bool>,
}

impl ViewExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, identity: &str, name: &str) -> Option<bool> {
        self.entries
            .get(&(identity.to_string(), name.to_string()))
            .map(|entry| *entry)
    }

    fn put(&self, identity: &str, name: &str, exists: bool) {
        self.entries
            .insert((identity.to_string(), name.to_string()), exists);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Answers "is this a view?" through the shared cache.
#[derive(Debug, Clone, Default)]
pub struct ViewResolver {
    cache: Arc<ViewExistenceCache>,
}

impl ViewResolver {
    /// A resolver backed by an injected cache, so batch runs can share one.
    pub fn new(cache: Arc<ViewExistenceCache>) -> Self {
        ViewResolver { cache }
    }

    pub fn cache(&self) -> &Arc<ViewExistenceCache> {
        &self.cache
    }

    /// Whether `table` names a view (plain or materialized).
    pub fn exists(
        &self,
        dialect: &dyn SchemaDialect,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<bool> {
        let identity = conn.identity().to_string();
        let key = table.qualified();
        if let Some(cached) = self.cache.get(&identity, &key) {
            return Ok(cached);
        }
        let exists = dialect.view_exists(conn, table)?;
        self.cache.put(&identity, &key, exists);
        Ok(exists)
    }

    /// Full classification. A cached negative answer short-circuits without
    /// touching the catalog.
    pub fn describe(
        &self,
        dialect: &dyn SchemaDialect,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<ViewDescriptor> {
        if !self.exists(dialect, conn, table)? {
            return Ok(ViewDescriptor::absent());
        }
        dialect.view_info(conn, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{QueryRows, SqliteConnection};
    use crate::schema::dialect::Sqlite;

    struct CountingConnection {
        inner: SqliteConnection,
        queries: usize,
    }

    impl CountingConnection {
        fn open(identity: &str, setup: &str) -> Self {
            let conn = rusqlite::Connection::open_in_memory().unwrap();
            conn.execute_batch(setup).unwrap();
            CountingConnection {
                inner: SqliteConnection::from_connection(conn, identity.to_string()),
                queries: 0,
            }
        }
    }

    impl SchemaConnection for CountingConnection {
        fn adapter_name(&self) -> &str {
            self.inner.adapter_name()
        }

        fn identity(&self) -> &str {
            self.inner.identity()
        }

        fn query(&mut self, sql: &str, params: &[crate::db::Value]) -> DbResult<QueryRows> {
            self.queries += 1;
            self.inner.query(sql, params)
        }
    }

    const SETUP: &str = "CREATE TABLE events (id INTEGER PRIMARY KEY);
                         CREATE VIEW recent AS SELECT * FROM events;";

    #[test]
    fn test_exists_caches_positive_and_negative_answers() {
        let resolver = ViewResolver::default();
        let mut conn = CountingConnection::open("db-a", SETUP);
        let view = QualifiedName::parse("recent");
        let table = QualifiedName::parse("events");

        assert!(resolver.exists(&Sqlite, &mut conn, &view).unwrap());
        assert!(resolver.exists(&Sqlite, &mut conn, &view).unwrap());
        assert_eq!(conn.queries, 1);

        assert!(!resolver.exists(&Sqlite, &mut conn, &table).unwrap());
        assert!(!resolver.exists(&Sqlite, &mut conn, &table).unwrap());
        assert_eq!(conn.queries, 2);
    }

    #[test]
    fn test_describe_short_circuits_on_cached_absence() {
        let resolver = ViewResolver::default();
        let mut conn = CountingConnection::open("db-a", SETUP);
        let table = QualifiedName::parse("events");

        let first = resolver.describe(&Sqlite, &mut conn, &table).unwrap();
        let second = resolver.describe(&Sqlite, &mut conn, &table).unwrap();
        assert_eq!(first, ViewDescriptor::absent());
        assert_eq!(second, ViewDescriptor::absent());
        assert_eq!(conn.queries, 1);
    }

    #[test]
    fn test_cache_is_scoped_by_connection_identity() {
        let cache = Arc::new(ViewExistenceCache::new());
        let resolver = ViewResolver::new(Arc::clone(&cache));
        let mut first = CountingConnection::open("db-a", SETUP);
        let mut second = CountingConnection::open("db-b", "CREATE TABLE events (id INTEGER);");
        let name = QualifiedName::parse("recent");

        assert!(resolver.exists(&Sqlite, &mut first, &name).unwrap());
        // Same name, different database: the cached answer must not leak.
        assert!(!resolver.exists(&Sqlite, &mut second, &name).unwrap());
        assert_eq!(cache.len(), 2);
    }
}

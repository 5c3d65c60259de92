//! Connection pooling with checkout guards.
//!
//! A pipeline run checks out exactly one connection and every collaborator
//! borrows it. The guard returns the connection on drop, including when a
//! panic unwinds out of a provider, so connections are never leaked.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use super::{connect, DatabaseError, DbResult, SchemaConnection};

type Factory = Box<dyn Fn() -> DbResult<Box<dyn SchemaConnection>> + Send + Sync>;

/// A pool of connections to one database.
///
/// Checkout pops an idle connection or builds a fresh one; there is no hard
/// cap because parallelism is already bounded by the worker thread count.
pub struct ConnectionPool {
    label: String,
    factory: Factory,
    idle: Mutex<Vec<Box<dyn SchemaConnection>>>,
}

impl ConnectionPool {
    /// Build a pool with a custom factory. Tests use this to inject fake
    /// connections.
    pub fn new(label: impl Into<String>, factory: Factory) -> Self {
        Self {
            label: label.into(),
            factory,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Build a pool that opens driver connections for an adapter and URL.
    pub fn for_database(label: &str, adapter: &str, url: &str) -> Self {
        let (label_owned, adapter, url) = (label.to_string(), adapter.to_string(), url.to_string());
        let factory_label = label_owned.clone();
        Self::new(
            label_owned,
            Box::new(move || connect(&factory_label, &adapter, &url)),
        )
    }

    /// The settings key this pool was built for.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Check a connection out. The returned guard releases it on drop.
    pub fn checkout(&self) -> DbResult<PooledConnection<'_>> {
        let reused = {
            let mut idle = self
                .idle
                .lock()
                .map_err(|_| DatabaseError::PoolPoisoned(self.label.clone()))?;
            idle.pop()
        };
        let conn = match reused {
            Some(conn) => conn,
            None => (self.factory)()?,
        };
        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
        })
    }

    /// Number of idle connections, for tests and diagnostics.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    fn restore(&self, conn: Box<dyn SchemaConnection>) {
        // Drop the connection instead of erroring if the mutex is poisoned;
        // restore runs inside Drop and must not fail.
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("label", &self.label)
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// RAII checkout guard. Dereferences to the connection.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Box<dyn SchemaConnection>>,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn SchemaConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_deref().expect("connection held until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_deref_mut().expect("connection held until drop")
    }
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool.label())
            .finish()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.restore(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{QueryRows, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeConnection;

    impl SchemaConnection for FakeConnection {
        fn adapter_name(&self) -> &str {
            "fake"
        }

        fn identity(&self) -> &str {
            "fake-identity"
        }

        fn query(&mut self, _sql: &str, _params: &[Value]) -> DbResult<QueryRows> {
            Ok(QueryRows::default())
        }
    }

    fn counting_pool(counter: Arc<AtomicUsize>) -> ConnectionPool {
        ConnectionPool::new(
            "test",
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeConnection) as Box<dyn SchemaConnection>)
            }),
        )
    }

    #[test]
    fn test_checkout_builds_then_reuses() {
        let built = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(built.clone());

        {
            let conn = pool.checkout().unwrap();
            assert_eq!(conn.adapter_name(), "fake");
        }
        assert_eq!(pool.idle_count(), 1);

        // Second checkout reuses the returned connection.
        let _conn = pool.checkout().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_concurrent_checkouts_build_separate_connections() {
        let built = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(built.clone());

        let first = pool.checkout().unwrap();
        let second = pool.checkout().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
        drop(first);
        drop(second);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_checkout_failure_propagates() {
        let pool = ConnectionPool::new(
            "broken",
            Box::new(|| {
                Err(DatabaseError::connection_failed(
                    "broken",
                    std::io::Error::new(std::io::ErrorKind::Other, "refused"),
                ))
            }),
        );
        let err = pool.checkout().unwrap_err();
        assert!(err.to_string().contains("connection failed"));
    }
}

use serde_json::json;

use marginalia::db::{ConnectionPool, DbResult, QueryRows, SchemaConnection, Value};
use marginalia::schema::{Dialect, IntrospectionReporter, QualifiedName, SchemaReflector};

/// Answers every catalog query with an empty result while recording the
/// statement and its parameters.
struct RecordingConnection {
    captured: Vec<(String, Vec<Value>)>,
}

impl RecordingConnection {
    fn new() -> Self {
        RecordingConnection {
            captured: Vec::new(),
        }
    }
}

impl SchemaConnection for RecordingConnection {
    fn adapter_name(&self) -> &str {
        "postgresql"
    }

    fn identity(&self) -> &str {
        "recording"
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<QueryRows> {
        self.captured.push((sql.to_string(), params.to_vec()));
        Ok(QueryRows::default())
    }
}

fn reflect(table: &str) -> Vec<(String, Vec<Value>)> {
    let mut conn = RecordingConnection::new();
    let reporter = IntrospectionReporter::new();
    let reflector = SchemaReflector::new(Dialect::Postgres);
    reflector
        .reflect(&mut conn, &QualifiedName::parse(table), &reporter)
        .expect("reflection against empty results");
    assert!(reporter.is_empty(), "no lookup should have failed");
    conn.captured
}

#[test]
fn test_schema_qualified_table_scopes_every_catalog_query() {
    let captured = reflect("audit.audit_logs");

    let scoped: Vec<&(String, Vec<Value>)> = captured
        .iter()
        .filter(|(_, params)| !params.is_empty())
        .collect();
    assert!(scoped.len() >= 5, "expected several scoped catalog lookups");

    // Every parameterized lookup carries the schema and the bare name.
    for (sql, params) in &scoped {
        assert_eq!(
            params.as_slice(),
            [json!("audit"), json!("audit_logs")],
            "query not scoped to audit.audit_logs: {}",
            sql
        );
    }
    assert!(scoped.iter().any(|(sql, _)| sql.contains("$1")));
    assert!(scoped.iter().any(|(sql, _)| sql.contains("$2")));
}

#[test]
fn test_unqualified_table_defaults_to_public_schema() {
    let captured = reflect("users");

    let mut saw_scoped = false;
    for (sql, params) in &captured {
        if params.is_empty() {
            continue;
        }
        saw_scoped = true;
        assert_eq!(
            params.as_slice(),
            [json!("public"), json!("users")],
            "query not scoped to public.users: {}",
            sql
        );
    }
    assert!(saw_scoped);
}

#[test]
fn test_unknown_adapter_fails_at_checkout() {
    let pool = ConnectionPool::for_database("primary", "oracle", "oracle://db.internal/app");
    let err = pool.checkout().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unsupported adapter 'oracle'"));
    assert!(message.contains("postgres"));
}

#[test]
fn test_injected_fake_connections_are_pooled() {
    let pool = ConnectionPool::new(
        "fake",
        Box::new(|| Ok(Box::new(RecordingConnection::new()) as Box<dyn SchemaConnection>)),
    );
    assert_eq!(pool.idle_count(), 0);
    {
        let guard = pool.checkout().expect("checkout");
        assert_eq!(guard.adapter_name(), "postgresql");
    }
    // The guard returned its connection on drop.
    assert_eq!(pool.idle_count(), 1);
    let reused = pool.checkout().expect("reuse");
    assert_eq!(pool.idle_count(), 0);
    drop(reused);
    assert_eq!(pool.idle_count(), 1);
}

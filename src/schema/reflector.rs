//! Table reflection.
//!
//! The reflector assembles a [`TableMetadata`] one field at a time. A
//! failed catalog lookup normally degrades to an empty field and a
//! recorded failure instead of sinking the whole table; with fail-fast
//! enabled the first failure propagates.

use std::sync::Mutex;

use tracing::warn;

use crate::db::{DatabaseError, DbResult, SchemaConnection};
use crate::schema::dialect::SchemaDialect;
use crate::schema::{Dialect, QualifiedName, TableMetadata};

/// One introspection lookup that failed during reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectionFailure {
    pub table: String,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for IntrospectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.table, self.field, self.message)
    }
}

/// Collects per-field introspection failures across a run.
#[derive(Debug, Default)]
pub struct IntrospectionReporter {
    failures: Mutex<Vec<IntrospectionFailure>>,
}

impl IntrospectionReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, table: &QualifiedName, field: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(table = %table, field, %message, "schema introspection lookup failed");
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.push(IntrospectionFailure {
            table: table.qualified(),
            field: field.to_string(),
            message,
        });
    }

    pub fn failures(&self) -> Vec<IntrospectionFailure> {
        match self.failures.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Take everything recorded so far, leaving the reporter empty.
    pub fn drain(&self) -> Vec<IntrospectionFailure> {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *failures)
    }

    pub fn is_empty(&self) -> bool {
        self.failures().is_empty()
    }
}

/// Reflects tables through a dialect, with per-field degradation.
#[derive(Debug, Clone, Copy)]
pub struct SchemaReflector {
    dialect: Dialect,
    fail_fast: bool,
}

impl SchemaReflector {
    pub fn new(dialect: Dialect) -> Self {
        SchemaReflector {
            dialect,
            fail_fast: false,
        }
    }

    /// Propagate the first lookup failure instead of degrading.
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Reflect one table. Lookups gated behind a capability the dialect
    /// does not have are skipped, not recorded as failures.
    pub fn reflect(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
        reporter: &IntrospectionReporter,
    ) -> DbResult<TableMetadata> {
        let d = self.dialect;
        let mut meta = TableMetadata::empty(table.clone(), d);

        match d.columns(conn, table) {
            Ok(columns) => meta.columns = columns,
            Err(err) => self.degrade(reporter, table, "columns", err)?,
        }
        match d.primary_key(conn, table) {
            Ok(primary_key) => meta.primary_key = primary_key,
            Err(err) => self.degrade(reporter, table, "primary_key", err)?,
        }
        match d.indexes(conn, table) {
            Ok(indexes) => meta.indexes = indexes,
            Err(err) => self.degrade(reporter, table, "indexes", err)?,
        }
        match d.foreign_keys(conn, table) {
            Ok(foreign_keys) => meta.foreign_keys = foreign_keys,
            Err(err) => self.degrade(reporter, table, "foreign_keys", err)?,
        }
        if d.supports_check_constraints() {
            match d.check_constraints(conn, table) {
                Ok(checks) => meta.check_constraints = checks,
                Err(err) => self.degrade(reporter, table, "check_constraints", err)?,
            }
        }
        if d.supports_generated_columns() {
            match d.generated_columns(conn, table) {
                Ok(generated) => meta.generated_columns = generated,
                Err(err) => self.degrade(reporter, table, "generated_columns", err)?,
            }
        }
        if d.supports_triggers() {
            match d.triggers(conn, table) {
                Ok(triggers) => meta.triggers = triggers,
                Err(err) => self.degrade(reporter, table, "triggers", err)?,
            }
        }
        if d.supports_storage_metadata() {
            match d.storage(conn, table) {
                Ok(storage) => meta.storage = storage,
                Err(err) => self.degrade(reporter, table, "storage", err)?,
            }
        }

        Ok(meta)
    }

    fn degrade(
        &self,
        reporter: &IntrospectionReporter,
        table: &QualifiedName,
        field: &str,
        err: DatabaseError,
    ) -> DbResult<()> {
        if self.fail_fast {
            return Err(err);
        }
        reporter.record(table, field, err.to_string());
        Ok(())
    }
}

//! Schema dialect definitions.
//!
//! This module provides a trait-based abstraction for catalog differences
//! between engine families. Each dialect implements `SchemaDialect` to
//! answer the same introspection questions from its own catalogs:
//!
//! - Columns, defaults, and generated columns: `pg_attribute` vs
//!   `information_schema.COLUMNS` vs `PRAGMA table_xinfo`
//! - Composite primary keys in declaration order
//! - Indexes (unique/partial), foreign keys, check constraints
//! - View classification from view registries only (`pg_views` /
//!   `pg_matviews`, `information_schema.VIEWS`, `sqlite_master`)
//! - User triggers, with internal engine triggers filtered out
//!
//! # Usage
//!
//! ```ignore
//! use marginalia::schema::{resolve_adapter, Dialect, SchemaDialect};
//!
//! let dialect = resolve_adapter("postgresql")?;  // Dialect::Postgres
//! let columns = dialect.columns(&mut *conn, &name)?;
//! ```
//!
//! Adapter resolution happens at exactly one point ([`resolve_adapter`]);
//! nothing else in the crate inspects adapter strings.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use serde::{Deserialize, Serialize};

use crate::db::{DatabaseError, DbResult, SchemaConnection};
use crate::schema::views::ViewDescriptor;
use crate::schema::{
    CheckConstraintMetadata, ColumnMetadata, ForeignKeyMetadata, GeneratedColumnMetadata,
    IndexMetadata, LogicalType, QualifiedName, StorageMetadata, TriggerMetadata,
};

/// Schema dialect trait - defines how a family of engines is introspected.
///
/// Capability methods gate the optional lookups; the reflector only calls
/// an introspection method when the matching capability answers true.
pub trait SchemaDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// Whether tables can live in named schemas.
    fn supports_schemas(&self) -> bool {
        true
    }

    /// Whether the engine has materialized views.
    fn supports_materialized_views(&self) -> bool {
        false
    }

    /// Whether check constraints are introspectable.
    fn supports_check_constraints(&self) -> bool {
        true
    }

    /// Whether generated columns are introspectable.
    fn supports_generated_columns(&self) -> bool {
        true
    }

    /// Whether user triggers are introspectable.
    fn supports_triggers(&self) -> bool {
        true
    }

    /// Whether storage engine / charset metadata exists (MySQL-class).
    fn supports_storage_metadata(&self) -> bool {
        false
    }

    /// Whether installed extensions are listable (Postgres-class).
    fn supports_extensions(&self) -> bool {
        false
    }

    // =========================================================================
    // Typing
    // =========================================================================

    /// Map a raw engine type to its logical type.
    ///
    /// Total: unrecognized types map to [`LogicalType::Unknown`].
    fn logical_type(&self, raw: &str) -> LogicalType;

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Columns in ordinal order.
    fn columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ColumnMetadata>>;

    /// Primary key columns in declaration order.
    fn primary_key(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<String>>;

    /// Secondary indexes, sorted by name, excluding the primary key index.
    fn indexes(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<IndexMetadata>>;

    /// Foreign keys, sorted by constraint name.
    fn foreign_keys(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ForeignKeyMetadata>>;

    /// Check constraints, sorted by name.
    fn check_constraints(
        &self,
        _conn: &mut dyn SchemaConnection,
        _table: &QualifiedName,
    ) -> DbResult<Vec<CheckConstraintMetadata>> {
        Ok(Vec::new())
    }

    /// Generated columns, in ordinal order.
    fn generated_columns(
        &self,
        _conn: &mut dyn SchemaConnection,
        _table: &QualifiedName,
    ) -> DbResult<Vec<GeneratedColumnMetadata>> {
        Ok(Vec::new())
    }

    /// User triggers, sorted by name.
    fn triggers(
        &self,
        _conn: &mut dyn SchemaConnection,
        _table: &QualifiedName,
    ) -> DbResult<Vec<TriggerMetadata>> {
        Ok(Vec::new())
    }

    /// Storage metadata, for engines that have it.
    fn storage(
        &self,
        _conn: &mut dyn SchemaConnection,
        _table: &QualifiedName,
    ) -> DbResult<Option<StorageMetadata>> {
        Ok(None)
    }

    /// Installed extensions, sorted by name.
    fn extensions(&self, _conn: &mut dyn SchemaConnection) -> DbResult<Vec<String>> {
        Ok(Vec::new())
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Whether a view (of any kind) with this name exists.
    ///
    /// Consults view registries only. A user table that happens to carry a
    /// view-ish name is never a view.
    fn view_exists(&self, conn: &mut dyn SchemaConnection, table: &QualifiedName)
        -> DbResult<bool>;

    /// Full view classification.
    fn view_info(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<ViewDescriptor>;
}

/// Supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SchemaDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

/// Adapter spellings recognized by [`resolve_adapter`]. Matching is by
/// case-insensitive substring, so `postgresql`, `jdbc:mysql`, and `sqlite3`
/// all resolve.
static ADAPTER_TABLE: &[(&str, Dialect)] = &[
    ("postgis", Dialect::Postgres),
    ("postgres", Dialect::Postgres),
    ("redshift", Dialect::Postgres),
    ("mysql", Dialect::MySql),
    ("trilogy", Dialect::MySql),
    ("mariadb", Dialect::MySql),
    ("sqlite", Dialect::Sqlite),
];

/// Spellings listed in the unsupported-adapter error.
pub const SUPPORTED_ADAPTERS: &str =
    "postgres, postgresql, postgis, redshift, mysql, mysql2, trilogy, mariadb, sqlite, sqlite3";

/// Resolve an adapter string to its dialect.
///
/// This is the single resolution point. Unknown adapters fail loudly with
/// the adapter named; they never fall back to a default dialect.
pub fn resolve_adapter(adapter: &str) -> DbResult<Dialect> {
    let needle = adapter.trim().to_ascii_lowercase();
    for (pattern, dialect) in ADAPTER_TABLE {
        if needle.contains(pattern) {
            return Ok(*dialect);
        }
    }
    Err(DatabaseError::UnsupportedAdapter {
        adapter: adapter.to_string(),
        expected: SUPPORTED_ADAPTERS,
    })
}

// Implement SchemaDialect for Dialect by delegating to the concrete types
impl SchemaDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn supports_schemas(&self) -> bool {
        self.dialect().supports_schemas()
    }

    fn supports_materialized_views(&self) -> bool {
        self.dialect().supports_materialized_views()
    }

    fn supports_check_constraints(&self) -> bool {
        self.dialect().supports_check_constraints()
    }

    fn supports_generated_columns(&self) -> bool {
        self.dialect().supports_generated_columns()
    }

    fn supports_triggers(&self) -> bool {
        self.dialect().supports_triggers()
    }

    fn supports_storage_metadata(&self) -> bool {
        self.dialect().supports_storage_metadata()
    }

    fn supports_extensions(&self) -> bool {
        self.dialect().supports_extensions()
    }

    fn logical_type(&self, raw: &str) -> LogicalType {
        self.dialect().logical_type(raw)
    }

    fn columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ColumnMetadata>> {
        self.dialect().columns(conn, table)
    }

    fn primary_key(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<String>> {
        self.dialect().primary_key(conn, table)
    }

    fn indexes(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<IndexMetadata>> {
        self.dialect().indexes(conn, table)
    }

    fn foreign_keys(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ForeignKeyMetadata>> {
        self.dialect().foreign_keys(conn, table)
    }

    fn check_constraints(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<CheckConstraintMetadata>> {
        self.dialect().check_constraints(conn, table)
    }

    fn generated_columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<GeneratedColumnMetadata>> {
        self.dialect().generated_columns(conn, table)
    }

    fn triggers(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<TriggerMetadata>> {
        self.dialect().triggers(conn, table)
    }

    fn storage(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Option<StorageMetadata>> {
        self.dialect().storage(conn, table)
    }

    fn extensions(&self, conn: &mut dyn SchemaConnection) -> DbResult<Vec<String>> {
        self.dialect().extensions(conn)
    }

    fn view_exists(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<bool> {
        self.dialect().view_exists(conn, table)
    }

    fn view_info(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<ViewDescriptor> {
        self.dialect().view_info(conn, table)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

/// Normalize a spelled-out referential action (`CASCADE`, `SET NULL`, ...)
/// to lowercase. `NO ACTION` is the engine default and is left implicit.
pub(crate) fn normalize_action(rule: &str) -> Option<String> {
    let normalized = rule.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" | "no action" => None,
        _ => Some(normalized),
    }
}

/// Character length declared in parens, when the raw type carries exactly
/// one number: `varchar(50)` yields 50, `numeric(10,2)` yields nothing.
pub(crate) fn parenthesized_length(raw: &str) -> Option<u32> {
    let open = raw.find('(')?;
    let close = raw[open..].find(')')? + open;
    let inner = raw[open + 1..close].trim();
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    inner.parse().ok()
}

//! Canonical schema metadata.
//!
//! Every dialect normalizes its catalog output into the types defined here.
//! Consumers (providers, analyzers, renderers) see one shape regardless of
//! which engine produced it; nothing downstream is allowed to branch on the
//! dialect to interpret a field.
//!
//! Ordering rules, so that rendered output is deterministic:
//! - primary key columns, index columns, and foreign key column pairs keep
//!   the order the engine declares
//! - indexes, foreign keys, check constraints, and triggers are sorted by
//!   name by the dialect that produced them

pub mod dialect;
pub mod reflector;
pub mod views;

pub use dialect::{resolve_adapter, Dialect, SchemaDialect};
pub use reflector::{IntrospectionFailure, IntrospectionReporter, SchemaReflector};
pub use views::{ViewDescriptor, ViewExistenceCache, ViewKind, ViewResolver};

use serde::{Deserialize, Serialize};

/// A table name with an optional schema qualifier.
///
/// Parsed by splitting on the first `.`; the original spelling is preserved
/// and can be recovered with [`QualifiedName::qualified`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    schema: Option<String>,
    name: String,
}

impl QualifiedName {
    /// Parse a raw table reference such as `products` or `audit.audit_logs`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => Self {
                schema: Some(schema.to_string()),
                name: name.to_string(),
            },
            _ => Self {
                schema: None,
                name: raw.to_string(),
            },
        }
    }

    /// Build a name with an explicit schema.
    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// The schema qualifier, if one was given.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The table name without its qualifier.
    pub fn bare_name(&self) -> &str {
        &self.name
    }

    /// The full spelling, `schema.name` or just `name`.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

/// Dialect-independent column type.
///
/// The mapping from raw engine type names is total: anything a dialect does
/// not recognize becomes [`LogicalType::Unknown`], never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    String,
    Text,
    Binary,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    Uuid,
    Inet,
    Enum,
    Unknown,
}

impl LogicalType {
    /// Lowercase name used in rendered annotations.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Boolean => "boolean",
            LogicalType::SmallInt => "smallint",
            LogicalType::Integer => "integer",
            LogicalType::BigInt => "bigint",
            LogicalType::Float => "float",
            LogicalType::Decimal => "decimal",
            LogicalType::String => "string",
            LogicalType::Text => "text",
            LogicalType::Binary => "binary",
            LogicalType::Date => "date",
            LogicalType::Time => "time",
            LogicalType::DateTime => "datetime",
            LogicalType::Timestamp => "timestamp",
            LogicalType::Json => "json",
            LogicalType::Uuid => "uuid",
            LogicalType::Inet => "inet",
            LogicalType::Enum => "enum",
            LogicalType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name as declared.
    pub name: String,
    /// Raw type string from the engine (e.g. `character varying(50)`).
    pub raw_type: String,
    /// Normalized type.
    pub logical_type: LogicalType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default expression as reported by the engine, if any.
    #[serde(default)]
    pub default: Option<String>,
    /// Declared character length, when the raw type carries one.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Whether the column is generated.
    #[serde(default)]
    pub generated: bool,
}

/// An index on a table. The primary key index is not included here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    /// Columns in index order.
    pub columns: Vec<String>,
    pub unique: bool,
    /// Predicate for partial indexes.
    #[serde(default)]
    pub where_clause: Option<String>,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyMetadata {
    pub name: String,
    /// Referencing columns, in constraint order.
    pub columns: Vec<String>,
    pub referenced_table: String,
    /// Referenced columns, paired positionally with `columns`.
    pub referenced_columns: Vec<String>,
    /// Normalized lowercase action (`cascade`, `restrict`, `set null`, ...).
    #[serde(default)]
    pub on_delete: Option<String>,
    #[serde(default)]
    pub on_update: Option<String>,
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraintMetadata {
    pub name: String,
    pub expression: String,
}

/// A generated (computed) column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedColumnMetadata {
    pub name: String,
    /// Generation expression, when the engine exposes it.
    #[serde(default)]
    pub expression: Option<String>,
    /// Stored vs virtual.
    pub stored: bool,
}

/// A user-defined trigger. Internal engine triggers are never reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerMetadata {
    pub name: String,
    pub definition: String,
}

/// Storage-engine metadata, for engines that expose it (MySQL-class).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMetadata {
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
}

/// Everything the engine knows about one table, in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: QualifiedName,
    pub dialect: Dialect,
    pub columns: Vec<ColumnMetadata>,
    /// Primary key columns in declaration order. Composite keys keep the
    /// order of the key declaration, not catalog row order.
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexMetadata>,
    pub foreign_keys: Vec<ForeignKeyMetadata>,
    pub check_constraints: Vec<CheckConstraintMetadata>,
    pub generated_columns: Vec<GeneratedColumnMetadata>,
    pub triggers: Vec<TriggerMetadata>,
    #[serde(default)]
    pub storage: Option<StorageMetadata>,
}

impl TableMetadata {
    /// An empty shell for a table; the reflector fills fields in one by one
    /// so that a single failed lookup degrades to a missing field.
    pub fn empty(name: QualifiedName, dialect: Dialect) -> Self {
        Self {
            name,
            dialect,
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            check_constraints: Vec::new(),
            generated_columns: Vec::new(),
            triggers: Vec::new(),
            storage: None,
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the primary key spans more than one column.
    pub fn has_composite_key(&self) -> bool {
        self.primary_key.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_unqualified() {
        let name = QualifiedName::parse("products");
        assert_eq!(name.schema(), None);
        assert_eq!(name.bare_name(), "products");
        assert_eq!(name.qualified(), "products");
    }

    #[test]
    fn test_qualified_name_with_schema() {
        let name = QualifiedName::parse("audit.audit_logs");
        assert_eq!(name.schema(), Some("audit"));
        assert_eq!(name.bare_name(), "audit_logs");
        assert_eq!(name.qualified(), "audit.audit_logs");
    }

    #[test]
    fn test_qualified_name_splits_on_first_dot() {
        let name = QualifiedName::parse("a.b.c");
        assert_eq!(name.schema(), Some("a"));
        assert_eq!(name.bare_name(), "b.c");
    }

    #[test]
    fn test_qualified_name_leading_dot_is_not_a_schema() {
        let name = QualifiedName::parse(".products");
        assert_eq!(name.schema(), None);
        assert_eq!(name.bare_name(), ".products");
    }

    #[test]
    fn test_qualified_name_display() {
        assert_eq!(QualifiedName::parse("audit.audit_logs").to_string(), "audit.audit_logs");
        assert_eq!(QualifiedName::with_schema("audit", "audit_logs").to_string(), "audit.audit_logs");
    }

    #[test]
    fn test_logical_type_display() {
        assert_eq!(LogicalType::Boolean.to_string(), "boolean");
        assert_eq!(LogicalType::BigInt.to_string(), "bigint");
        assert_eq!(LogicalType::DateTime.to_string(), "datetime");
        assert_eq!(LogicalType::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_table_metadata_column_lookup() {
        let mut table = TableMetadata::empty(QualifiedName::parse("products"), Dialect::Sqlite);
        table.columns.push(ColumnMetadata {
            name: "id".to_string(),
            raw_type: "INTEGER".to_string(),
            logical_type: LogicalType::Integer,
            nullable: false,
            default: None,
            limit: None,
            generated: false,
        });

        assert!(table.column("id").is_some());
        assert!(table.column("missing").is_none());
        assert!(!table.has_composite_key());
    }

    #[test]
    fn test_composite_key_detection() {
        let mut table = TableMetadata::empty(QualifiedName::parse("order_lines"), Dialect::Postgres);
        table.primary_key = vec!["order_id".to_string(), "line_number".to_string()];
        assert!(table.has_composite_key());
    }
}

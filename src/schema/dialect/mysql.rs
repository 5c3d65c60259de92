//! MySQL / MariaDB dialect.
//!
//! Everything comes from `information_schema`. Table scoping uses
//! `TABLE_SCHEMA = COALESCE(?, DATABASE())` so unqualified names resolve
//! against the connected database while qualified names pin the schema.

use serde_json::json;

use crate::db::{DbResult, SchemaConnection, Value};
use crate::schema::views::{ViewDescriptor, ViewKind};
use crate::schema::{
    CheckConstraintMetadata, ColumnMetadata, ForeignKeyMetadata, GeneratedColumnMetadata,
    IndexMetadata, LogicalType, QualifiedName, StorageMetadata, TriggerMetadata,
};

use super::{normalize_action, SchemaDialect};

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl MySql {
    fn scope_params(table: &QualifiedName) -> Vec<Value> {
        let schema = match table.schema() {
            Some(schema) => json!(schema),
            None => Value::Null,
        };
        vec![schema, json!(table.bare_name())]
    }
}

impl SchemaDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports_storage_metadata(&self) -> bool {
        true
    }

    fn logical_type(&self, raw: &str) -> LogicalType {
        let lowered = raw.trim().to_ascii_lowercase();
        // Rails convention: tinyint(1) is a boolean.
        if lowered.starts_with("tinyint(1)") {
            return LogicalType::Boolean;
        }
        let mut base = lowered.split('(').next().unwrap_or(&lowered).trim();
        for suffix in [" unsigned", " zerofill"] {
            base = base.strip_suffix(suffix).unwrap_or(base).trim_end();
        }
        match base {
            "bool" | "boolean" => LogicalType::Boolean,
            "tinyint" | "smallint" => LogicalType::SmallInt,
            "mediumint" | "int" | "integer" | "year" => LogicalType::Integer,
            "bigint" => LogicalType::BigInt,
            "float" | "double" | "double precision" | "real" => LogicalType::Float,
            "decimal" | "numeric" => LogicalType::Decimal,
            "char" | "varchar" => LogicalType::String,
            "tinytext" | "text" | "mediumtext" | "longtext" => LogicalType::Text,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "bit" => {
                LogicalType::Binary
            }
            "date" => LogicalType::Date,
            "time" => LogicalType::Time,
            "datetime" => LogicalType::DateTime,
            "timestamp" => LogicalType::Timestamp,
            "json" => LogicalType::Json,
            "enum" | "set" => LogicalType::Enum,
            _ => LogicalType::Unknown,
        }
    }

    fn columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ColumnMetadata>> {
        let sql = "
            SELECT COLUMN_NAME AS column_name,
                   COLUMN_TYPE AS column_type,
                   IS_NULLABLE AS is_nullable,
                   COLUMN_DEFAULT AS column_default,
                   CHARACTER_MAXIMUM_LENGTH AS char_length,
                   EXTRA AS extra
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let raw_type = row.text("column_type")?;
            let extra = row.text("extra")?.to_ascii_uppercase();
            // EXTRA says DEFAULT_GENERATED for expression defaults; only
            // VIRTUAL/STORED GENERATED mark generated columns.
            let generated =
                extra.contains("VIRTUAL GENERATED") || extra.contains("STORED GENERATED");
            let logical_type = self.logical_type(&raw_type);
            let limit = if logical_type == LogicalType::String {
                row.opt_integer("char_length")?
                    .and_then(|n| u32::try_from(n).ok())
            } else {
                None
            };
            let default = if generated {
                None
            } else {
                row.opt_text("column_default")?
            };
            columns.push(ColumnMetadata {
                name: row.text("column_name")?,
                raw_type,
                logical_type,
                nullable: row.text("is_nullable")?.eq_ignore_ascii_case("yes"),
                default,
                limit,
                generated,
            });
        }
        Ok(columns)
    }

    fn primary_key(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<String>> {
        let sql = "
            SELECT COLUMN_NAME AS column_name
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
              AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION";
        let rows = conn.query(sql, &Self::scope_params(table))?;
        rows.iter().map(|row| row.text("column_name")).collect()
    }

    fn indexes(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<IndexMetadata>> {
        let sql = "
            SELECT INDEX_NAME AS index_name,
                   COLUMN_NAME AS column_name,
                   NON_UNIQUE AS non_unique
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
              AND INDEX_NAME <> 'PRIMARY'
            ORDER BY INDEX_NAME, SEQ_IN_INDEX";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut indexes: Vec<IndexMetadata> = Vec::new();
        for row in rows.iter() {
            let name = row.text("index_name")?;
            let column = row.text("column_name")?;
            match indexes.last_mut() {
                Some(last) if last.name == name => last.columns.push(column),
                _ => indexes.push(IndexMetadata {
                    name,
                    columns: vec![column],
                    unique: row.integer("non_unique")? == 0,
                    where_clause: None,
                }),
            }
        }
        Ok(indexes)
    }

    fn foreign_keys(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ForeignKeyMetadata>> {
        let sql = "
            SELECT k.CONSTRAINT_NAME AS constraint_name,
                   k.TABLE_SCHEMA AS owning_schema,
                   k.COLUMN_NAME AS column_name,
                   k.REFERENCED_TABLE_SCHEMA AS referenced_schema,
                   k.REFERENCED_TABLE_NAME AS referenced_table,
                   k.REFERENCED_COLUMN_NAME AS referenced_column,
                   r.DELETE_RULE AS delete_rule,
                   r.UPDATE_RULE AS update_rule
            FROM information_schema.KEY_COLUMN_USAGE k
            JOIN information_schema.REFERENTIAL_CONSTRAINTS r
              ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
             AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
            WHERE k.TABLE_SCHEMA = COALESCE(?, DATABASE()) AND k.TABLE_NAME = ?
              AND k.REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut keys: Vec<ForeignKeyMetadata> = Vec::new();
        for row in rows.iter() {
            let name = row.text("constraint_name")?;
            let column = row.text("column_name")?;
            let referenced_column = row.text("referenced_column")?;
            match keys.last_mut() {
                Some(last) if last.name == name => {
                    last.columns.push(column);
                    last.referenced_columns.push(referenced_column);
                }
                _ => {
                    let owning_schema = row.text("owning_schema")?;
                    let ref_schema = row.text("referenced_schema")?;
                    let ref_table = row.text("referenced_table")?;
                    let referenced_table = if ref_schema == owning_schema {
                        ref_table
                    } else {
                        format!("{}.{}", ref_schema, ref_table)
                    };
                    keys.push(ForeignKeyMetadata {
                        name,
                        columns: vec![column],
                        referenced_table,
                        referenced_columns: vec![referenced_column],
                        on_delete: normalize_action(&row.text("delete_rule")?),
                        on_update: normalize_action(&row.text("update_rule")?),
                    });
                }
            }
        }
        Ok(keys)
    }

    fn check_constraints(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<CheckConstraintMetadata>> {
        let sql = "
            SELECT cc.CONSTRAINT_NAME AS constraint_name,
                   cc.CHECK_CLAUSE AS check_clause
            FROM information_schema.CHECK_CONSTRAINTS cc
            JOIN information_schema.TABLE_CONSTRAINTS tc
              ON tc.CONSTRAINT_SCHEMA = cc.CONSTRAINT_SCHEMA
             AND tc.CONSTRAINT_NAME = cc.CONSTRAINT_NAME
            WHERE tc.TABLE_SCHEMA = COALESCE(?, DATABASE()) AND tc.TABLE_NAME = ?
              AND tc.CONSTRAINT_TYPE = 'CHECK'
            ORDER BY cc.CONSTRAINT_NAME";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut checks = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            checks.push(CheckConstraintMetadata {
                name: row.text("constraint_name")?,
                expression: row.text("check_clause")?,
            });
        }
        Ok(checks)
    }

    fn generated_columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<GeneratedColumnMetadata>> {
        let sql = "
            SELECT COLUMN_NAME AS column_name,
                   GENERATION_EXPRESSION AS expression,
                   EXTRA AS extra
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
              AND GENERATION_EXPRESSION <> ''
            ORDER BY ORDINAL_POSITION";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut generated = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            generated.push(GeneratedColumnMetadata {
                name: row.text("column_name")?,
                expression: row.opt_text("expression")?,
                stored: row.text("extra")?.to_ascii_uppercase().contains("STORED"),
            });
        }
        Ok(generated)
    }

    fn triggers(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<TriggerMetadata>> {
        let sql = "
            SELECT TRIGGER_NAME AS trigger_name,
                   ACTION_TIMING AS action_timing,
                   EVENT_MANIPULATION AS event,
                   ACTION_STATEMENT AS statement
            FROM information_schema.TRIGGERS
            WHERE EVENT_OBJECT_SCHEMA = COALESCE(?, DATABASE())
              AND EVENT_OBJECT_TABLE = ?
            ORDER BY TRIGGER_NAME";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut triggers = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            triggers.push(TriggerMetadata {
                name: row.text("trigger_name")?,
                definition: format!(
                    "{} {} {}",
                    row.text("action_timing")?,
                    row.text("event")?,
                    row.text("statement")?
                ),
            });
        }
        Ok(triggers)
    }

    fn storage(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Option<StorageMetadata>> {
        let sql = "
            SELECT t.ENGINE AS engine,
                   ccsa.CHARACTER_SET_NAME AS charset,
                   t.TABLE_COLLATION AS collation
            FROM information_schema.TABLES t
            LEFT JOIN information_schema.COLLATION_CHARACTER_SET_APPLICABILITY ccsa
              ON ccsa.COLLATION_NAME = t.TABLE_COLLATION
            WHERE t.TABLE_SCHEMA = COALESCE(?, DATABASE()) AND t.TABLE_NAME = ?";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let row = match rows.first() {
            Some(row) => row,
            None => return Ok(None),
        };
        let storage = StorageMetadata {
            engine: row.opt_text("engine")?,
            charset: row.opt_text("charset")?,
            collation: row.opt_text("collation")?,
        };
        // Views report a NULL engine; nothing worth showing.
        if storage.engine.is_none() && storage.charset.is_none() && storage.collation.is_none() {
            return Ok(None);
        }
        Ok(Some(storage))
    }

    fn view_exists(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<bool> {
        let sql = "
            SELECT COUNT(*) AS matches
            FROM information_schema.VIEWS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?";
        let rows = conn.query(sql, &Self::scope_params(table))?;
        match rows.first() {
            Some(row) => Ok(row.integer("matches")? > 0),
            None => Ok(false),
        }
    }

    fn view_info(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<ViewDescriptor> {
        let sql = "
            SELECT IS_UPDATABLE AS is_updatable
            FROM information_schema.VIEWS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        match rows.first() {
            Some(row) => Ok(ViewDescriptor {
                exists: true,
                kind: ViewKind::View,
                updatable: row.text("is_updatable")?.eq_ignore_ascii_case("yes"),
                // No catalog exposes view source tables.
                dependencies: Vec::new(),
                refresh_strategy: None,
                last_refreshed: None,
            }),
            None => Ok(ViewDescriptor::absent()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_type_core_mappings() {
        assert_eq!(MySql.logical_type("tinyint(1)"), LogicalType::Boolean);
        assert_eq!(MySql.logical_type("tinyint(4)"), LogicalType::SmallInt);
        assert_eq!(MySql.logical_type("int(11)"), LogicalType::Integer);
        assert_eq!(MySql.logical_type("bigint(20)"), LogicalType::BigInt);
        assert_eq!(MySql.logical_type("varchar(255)"), LogicalType::String);
        assert_eq!(MySql.logical_type("longtext"), LogicalType::Text);
        assert_eq!(MySql.logical_type("decimal(10,2)"), LogicalType::Decimal);
        assert_eq!(MySql.logical_type("datetime"), LogicalType::DateTime);
        assert_eq!(MySql.logical_type("timestamp"), LogicalType::Timestamp);
        assert_eq!(MySql.logical_type("json"), LogicalType::Json);
        assert_eq!(MySql.logical_type("enum('a','b')"), LogicalType::Enum);
        assert_eq!(MySql.logical_type("blob"), LogicalType::Binary);
    }

    #[test]
    fn test_logical_type_unsigned_suffix() {
        assert_eq!(MySql.logical_type("int(10) unsigned"), LogicalType::Integer);
        assert_eq!(MySql.logical_type("bigint unsigned"), LogicalType::BigInt);
        assert_eq!(MySql.logical_type("tinyint(1) unsigned"), LogicalType::Boolean);
    }

    #[test]
    fn test_scope_params_unqualified_uses_null_schema() {
        let params = MySql::scope_params(&QualifiedName::parse("widgets"));
        assert_eq!(params[0], Value::Null);
        assert_eq!(params[1], json!("widgets"));
    }

    #[test]
    fn test_scope_params_qualified_pins_schema() {
        let params = MySql::scope_params(&QualifiedName::parse("audit.audit_logs"));
        assert_eq!(params[0], json!("audit"));
        assert_eq!(params[1], json!("audit_logs"));
    }
}

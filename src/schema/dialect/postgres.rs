//! Postgres dialect.
//!
//! Reads the system catalogs directly (`pg_attribute`, `pg_constraint`,
//! `pg_index`, `pg_trigger`, `pg_depend`) rather than `information_schema`,
//! which loses composite key order and hides partial index predicates.
//! Exotic catalog columns are cast to text in SQL so the driver only has
//! to handle a small set of wire types.

use serde_json::json;

use crate::db::{DbResult, SchemaConnection, Value};
use crate::schema::views::{ViewDescriptor, ViewKind};
use crate::schema::{
    CheckConstraintMetadata, ColumnMetadata, ForeignKeyMetadata, GeneratedColumnMetadata,
    IndexMetadata, LogicalType, QualifiedName, TriggerMetadata,
};

use super::{parenthesized_length, SchemaDialect};

/// Unqualified tables live in `public`; search_path is not consulted.
const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl Postgres {
    fn scope_params(table: &QualifiedName) -> Vec<Value> {
        vec![
            json!(table.schema().unwrap_or(DEFAULT_SCHEMA)),
            json!(table.bare_name()),
        ]
    }
}

impl SchemaDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn supports_materialized_views(&self) -> bool {
        true
    }

    fn supports_extensions(&self) -> bool {
        true
    }

    fn logical_type(&self, raw: &str) -> LogicalType {
        let base = raw
            .split('(')
            .next()
            .unwrap_or(raw)
            .trim()
            .to_ascii_lowercase();
        let base = base.strip_suffix("[]").unwrap_or(&base);
        match base {
            "boolean" | "bool" => LogicalType::Boolean,
            "smallint" | "int2" | "smallserial" => LogicalType::SmallInt,
            "integer" | "int" | "int4" | "serial" => LogicalType::Integer,
            "bigint" | "int8" | "bigserial" => LogicalType::BigInt,
            "real" | "float4" | "double precision" | "float8" => LogicalType::Float,
            "numeric" | "decimal" | "money" => LogicalType::Decimal,
            "character varying" | "varchar" | "character" | "char" | "bpchar" | "citext" => {
                LogicalType::String
            }
            "text" => LogicalType::Text,
            "bytea" => LogicalType::Binary,
            "date" => LogicalType::Date,
            "time" | "time without time zone" | "time with time zone" | "timetz" => {
                LogicalType::Time
            }
            "timestamp" | "timestamp without time zone" => LogicalType::DateTime,
            "timestamp with time zone" | "timestamptz" => LogicalType::Timestamp,
            "json" | "jsonb" => LogicalType::Json,
            "uuid" => LogicalType::Uuid,
            "inet" | "cidr" | "macaddr" | "macaddr8" => LogicalType::Inet,
            _ => LogicalType::Unknown,
        }
    }

    fn columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ColumnMetadata>> {
        let sql = "
            SELECT a.attname AS column_name,
                   format_type(a.atttypid, a.atttypmod) AS data_type,
                   a.attnotnull AS not_null,
                   pg_get_expr(d.adbin, d.adrelid) AS default_expr,
                   a.attgenerated::text AS generated_kind,
                   t.typtype::text AS type_kind
            FROM pg_attribute a
            JOIN pg_class c ON a.attrelid = c.oid
            JOIN pg_namespace n ON c.relnamespace = n.oid
            JOIN pg_type t ON t.oid = a.atttypid
            LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            WHERE n.nspname = $1 AND c.relname = $2
              AND a.attnum > 0 AND NOT a.attisdropped
            ORDER BY a.attnum";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let raw_type = row.text("data_type")?;
            let generated = !row.text("generated_kind")?.is_empty();
            let logical_type = if row.text("type_kind")? == "e" {
                LogicalType::Enum
            } else {
                self.logical_type(&raw_type)
            };
            let limit = if logical_type == LogicalType::String {
                parenthesized_length(&raw_type)
            } else {
                None
            };
            // For generated columns pg_attrdef holds the generation
            // expression, not a default.
            let default = if generated {
                None
            } else {
                row.opt_text("default_expr")?
            };
            columns.push(ColumnMetadata {
                name: row.text("column_name")?,
                raw_type,
                logical_type,
                nullable: !row.boolean("not_null")?,
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
            SELECT a.attname AS column_name
            FROM pg_constraint con
            JOIN pg_class c ON con.conrelid = c.oid
            JOIN pg_namespace n ON c.relnamespace = n.oid
            JOIN unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1 AND c.relname = $2 AND con.contype = 'p'
            ORDER BY k.ord";
        let rows = conn.query(sql, &Self::scope_params(table))?;
        rows.iter().map(|row| row.text("column_name")).collect()
    }

    fn indexes(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<IndexMetadata>> {
        let sql = "
            SELECT ic.relname AS index_name,
                   a.attname AS column_name,
                   i.indisunique AS is_unique,
                   pg_get_expr(i.indpred, i.indrelid) AS predicate
            FROM pg_index i
            JOIN pg_class c ON i.indrelid = c.oid
            JOIN pg_class ic ON i.indexrelid = ic.oid
            JOIN pg_namespace n ON c.relnamespace = n.oid
            JOIN unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1 AND c.relname = $2 AND NOT i.indisprimary
            ORDER BY ic.relname, k.ord";
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
                    unique: row.boolean("is_unique")?,
                    where_clause: row.opt_text("predicate")?,
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
            SELECT con.conname AS constraint_name,
                   a.attname AS column_name,
                   fn.nspname AS referenced_schema,
                   fc.relname AS referenced_table,
                   fa.attname AS referenced_column,
                   con.confdeltype::text AS delete_action,
                   con.confupdtype::text AS update_action
            FROM pg_constraint con
            JOIN pg_class c ON con.conrelid = c.oid
            JOIN pg_namespace n ON c.relnamespace = n.oid
            JOIN pg_class fc ON con.confrelid = fc.oid
            JOIN pg_namespace fn ON fc.relnamespace = fn.oid
            JOIN unnest(con.conkey, con.confkey) WITH ORDINALITY
                 AS k(attnum, fattnum, ord) ON true
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            JOIN pg_attribute fa ON fa.attrelid = fc.oid AND fa.attnum = k.fattnum
            WHERE n.nspname = $1 AND c.relname = $2 AND con.contype = 'f'
            ORDER BY con.conname, k.ord";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let effective_schema = table.schema().unwrap_or(DEFAULT_SCHEMA);
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
                    let ref_schema = row.text("referenced_schema")?;
                    let ref_table = row.text("referenced_table")?;
                    let referenced_table = if ref_schema == effective_schema {
                        ref_table
                    } else {
                        format!("{}.{}", ref_schema, ref_table)
                    };
                    keys.push(ForeignKeyMetadata {
                        name,
                        columns: vec![column],
                        referenced_table,
                        referenced_columns: vec![referenced_column],
                        on_delete: referential_action(&row.text("delete_action")?),
                        on_update: referential_action(&row.text("update_action")?),
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
            SELECT con.conname AS constraint_name,
                   pg_get_constraintdef(con.oid) AS definition
            FROM pg_constraint con
            JOIN pg_class c ON con.conrelid = c.oid
            JOIN pg_namespace n ON c.relnamespace = n.oid
            WHERE n.nspname = $1 AND c.relname = $2 AND con.contype = 'c'
            ORDER BY con.conname";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut checks = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            checks.push(CheckConstraintMetadata {
                name: row.text("constraint_name")?,
                expression: strip_check_prefix(&row.text("definition")?),
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
            SELECT a.attname AS column_name,
                   pg_get_expr(d.adbin, d.adrelid) AS expression,
                   a.attgenerated::text AS generated_kind
            FROM pg_attribute a
            JOIN pg_class c ON a.attrelid = c.oid
            JOIN pg_namespace n ON c.relnamespace = n.oid
            LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            WHERE n.nspname = $1 AND c.relname = $2
              AND a.attnum > 0 AND NOT a.attisdropped AND a.attgenerated <> ''
            ORDER BY a.attnum";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut generated = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            generated.push(GeneratedColumnMetadata {
                name: row.text("column_name")?,
                expression: row.opt_text("expression")?,
                stored: row.text("generated_kind")? == "s",
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
            SELECT t.tgname AS trigger_name,
                   pg_get_triggerdef(t.oid) AS definition
            FROM pg_trigger t
            JOIN pg_class c ON t.tgrelid = c.oid
            JOIN pg_namespace n ON c.relnamespace = n.oid
            WHERE n.nspname = $1 AND c.relname = $2 AND NOT t.tgisinternal
            ORDER BY t.tgname";
        let rows = conn.query(sql, &Self::scope_params(table))?;

        let mut triggers = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            triggers.push(TriggerMetadata {
                name: row.text("trigger_name")?,
                definition: row.text("definition")?,
            });
        }
        Ok(triggers)
    }

    fn extensions(&self, conn: &mut dyn SchemaConnection) -> DbResult<Vec<String>> {
        let rows = conn.query("SELECT extname FROM pg_extension ORDER BY extname", &[])?;
        rows.iter().map(|row| row.text("extname")).collect()
    }

    fn view_exists(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<bool> {
        let sql = "
            SELECT COUNT(*) AS matches
            FROM (
                SELECT viewname AS name FROM pg_views WHERE schemaname = $1
                UNION ALL
                SELECT matviewname FROM pg_matviews WHERE schemaname = $1
            ) v
            WHERE v.name = $2";
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
        let params = Self::scope_params(table);

        let plain = conn.query(
            "SELECT viewname FROM pg_views WHERE schemaname = $1 AND viewname = $2",
            &params,
        )?;
        if !plain.is_empty() {
            let updatable = conn.query(
                "SELECT is_updatable FROM information_schema.views
                 WHERE table_schema = $1 AND table_name = $2",
                &params,
            )?;
            let is_updatable = match updatable.first() {
                Some(row) => row.text("is_updatable")?.eq_ignore_ascii_case("yes"),
                None => false,
            };
            return Ok(ViewDescriptor {
                exists: true,
                kind: ViewKind::View,
                updatable: is_updatable,
                dependencies: self.view_dependencies(conn, table)?,
                refresh_strategy: None,
                last_refreshed: None,
            });
        }

        let materialized = conn.query(
            "SELECT ispopulated FROM pg_matviews
             WHERE schemaname = $1 AND matviewname = $2",
            &params,
        )?;
        if let Some(row) = materialized.first() {
            let strategy = if row.boolean("ispopulated")? {
                "manual"
            } else {
                "manual (unpopulated)"
            };
            return Ok(ViewDescriptor {
                exists: true,
                kind: ViewKind::MaterializedView,
                updatable: false,
                dependencies: self.view_dependencies(conn, table)?,
                refresh_strategy: Some(strategy.to_string()),
                // Postgres does not record refresh timestamps.
                last_refreshed: None,
            });
        }

        Ok(ViewDescriptor::absent())
    }
}

impl Postgres {
    /// Relations a view reads from, via its rewrite rule.
    fn view_dependencies(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<String>> {
        let sql = "
            SELECT DISTINCT sc.relname AS source_table
            FROM pg_class v
            JOIN pg_namespace n ON v.relnamespace = n.oid
            JOIN pg_rewrite r ON r.ev_class = v.oid
            JOIN pg_depend d ON d.objid = r.oid
            JOIN pg_class sc ON sc.oid = d.refobjid
            WHERE n.nspname = $1 AND v.relname = $2
              AND d.refobjid <> v.oid
              AND sc.relkind IN ('r', 'v', 'm', 'p', 'f')
            ORDER BY sc.relname";
        let rows = conn.query(sql, &Self::scope_params(table))?;
        rows.iter().map(|row| row.text("source_table")).collect()
    }
}

/// Map a `pg_constraint` action code to a normalized action word.
/// `NO ACTION` is the engine default and is left implicit.
fn referential_action(code: &str) -> Option<String> {
    match code {
        "r" => Some("restrict".to_string()),
        "c" => Some("cascade".to_string()),
        "n" => Some("set null".to_string()),
        "d" => Some("set default".to_string()),
        _ => None,
    }
}

/// `pg_get_constraintdef` wraps the expression as `CHECK ((expr))`.
fn strip_check_prefix(definition: &str) -> String {
    let trimmed = definition.trim();
    let body = trimmed
        .strip_prefix("CHECK ")
        .or_else(|| trimmed.strip_prefix("CHECK"))
        .unwrap_or(trimmed)
        .trim();
    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        // Only unwrap when the outer parens actually pair with each other.
        let mut depth = 0i32;
        for (i, b) in inner.bytes().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth < 0 && i < inner.len() - 1 {
                        return body.to_string();
                    }
                }
                _ => {}
            }
        }
        if depth == 0 {
            return inner.trim().to_string();
        }
    }
    body.to_string()
}

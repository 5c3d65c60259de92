//! SQLite dialect.
//!
//! Structure comes from PRAGMAs (`table_xinfo`, `index_list`, `index_info`,
//! `foreign_key_list`) plus `sqlite_master`. PRAGMA arguments cannot be
//! bound, so table names are embedded with quote escaping. Check
//! constraints and generation expressions are not exposed by any PRAGMA
//! and are recovered from the stored `CREATE TABLE` text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::db::{DbResult, SchemaConnection};
use crate::schema::views::{ViewDescriptor, ViewKind};
use crate::schema::{
    CheckConstraintMetadata, ColumnMetadata, ForeignKeyMetadata, GeneratedColumnMetadata,
    IndexMetadata, LogicalType, QualifiedName, TriggerMetadata,
};

use super::{normalize_action, parenthesized_length, SchemaDialect};

#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

static CHECK_CONSTRAINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:CONSTRAINT\s+(?:"([^"]+)"|([A-Za-z_]\w*))\s+)?CHECK\s*\("#)
        .expect("check constraint pattern")
});

static INDEX_PREDICATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bWHERE\b\s*(.+?)\s*;?\s*$").expect("index predicate pattern"));

impl Sqlite {
    fn xinfo(
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<crate::db::QueryRows> {
        conn.query(
            &format!("PRAGMA table_xinfo('{}')", quote_pragma_arg(table.bare_name())),
            &[],
        )
    }

    fn table_sql(
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Option<String>> {
        let rows = conn.query(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[json!(table.bare_name())],
        )?;
        match rows.first() {
            Some(row) => row.opt_text("sql"),
            None => Ok(None),
        }
    }
}

impl SchemaDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_schemas(&self) -> bool {
        false
    }

    fn logical_type(&self, raw: &str) -> LogicalType {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.is_empty() {
            return LogicalType::Unknown;
        }
        // Affinity-style matching; order matters for overlapping names
        // (datetime before date before time, bigint before int).
        if lowered.contains("bool") {
            LogicalType::Boolean
        } else if lowered.contains("datetime") {
            LogicalType::DateTime
        } else if lowered.contains("timestamp") {
            LogicalType::Timestamp
        } else if lowered.contains("date") {
            LogicalType::Date
        } else if lowered.contains("time") {
            LogicalType::Time
        } else if lowered.contains("json") {
            LogicalType::Json
        } else if lowered.contains("uuid") {
            LogicalType::Uuid
        } else if lowered.contains("bigint") || lowered.contains("int8") {
            LogicalType::BigInt
        } else if lowered.contains("smallint")
            || lowered.contains("tinyint")
            || lowered.contains("int2")
        {
            LogicalType::SmallInt
        } else if lowered.contains("int") {
            LogicalType::Integer
        } else if lowered.contains("char") {
            LogicalType::String
        } else if lowered.contains("text") || lowered.contains("clob") {
            LogicalType::Text
        } else if lowered.contains("blob") || lowered.contains("binary") {
            LogicalType::Binary
        } else if lowered.contains("real") || lowered.contains("floa") || lowered.contains("doub") {
            LogicalType::Float
        } else if lowered.contains("dec") || lowered.contains("numeric") {
            LogicalType::Decimal
        } else {
            LogicalType::Unknown
        }
    }

    fn columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ColumnMetadata>> {
        let rows = Self::xinfo(conn, table)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let hidden = row.opt_integer("hidden")?.unwrap_or(0);
            // hidden = 1 marks virtual-table hidden columns; 2 and 3 are
            // VIRTUAL and STORED generated columns.
            if hidden == 1 {
                continue;
            }
            let generated = hidden == 2 || hidden == 3;
            let raw_type = row.text("type")?;
            let logical_type = self.logical_type(&raw_type);
            let limit = if logical_type == LogicalType::String {
                parenthesized_length(&raw_type)
            } else {
                None
            };
            columns.push(ColumnMetadata {
                name: row.text("name")?,
                raw_type,
                logical_type,
                nullable: row.integer("notnull")? == 0,
                default: row.opt_text("dflt_value")?,
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
        let rows = Self::xinfo(conn, table)?;

        // pk gives the 1-based position within a composite key.
        let mut members: Vec<(i64, String)> = Vec::new();
        for row in rows.iter() {
            let position = row.integer("pk")?;
            if position > 0 {
                members.push((position, row.text("name")?));
            }
        }
        members.sort_by_key(|(position, _)| *position);
        Ok(members.into_iter().map(|(_, name)| name).collect())
    }

    fn indexes(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<IndexMetadata>> {
        let list = conn.query(
            &format!("PRAGMA index_list('{}')", quote_pragma_arg(table.bare_name())),
            &[],
        )?;

        let mut indexes = Vec::new();
        for row in list.iter() {
            let name = row.text("name")?;
            let origin = row.text("origin")?;
            if origin == "pk" || name.starts_with("sqlite_autoindex_") {
                continue;
            }
            let unique = row.integer("unique")? != 0;
            let partial = row.opt_integer("partial")?.unwrap_or(0) != 0;

            let info = conn.query(
                &format!("PRAGMA index_info('{}')", quote_pragma_arg(&name)),
                &[],
            )?;
            let mut members: Vec<(i64, String)> = Vec::new();
            for member in info.iter() {
                // Expression index columns have no backing column name.
                let column = member
                    .opt_text("name")?
                    .unwrap_or_else(|| "<expression>".to_string());
                members.push((member.integer("seqno")?, column));
            }
            members.sort_by_key(|(seqno, _)| *seqno);

            let where_clause = if partial {
                index_predicate(conn, &name)?
            } else {
                None
            };
            indexes.push(IndexMetadata {
                name,
                columns: members.into_iter().map(|(_, column)| column).collect(),
                unique,
                where_clause,
            });
        }
        // index_list reports newest first.
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    fn foreign_keys(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<ForeignKeyMetadata>> {
        let rows = conn.query(
            &format!(
                "PRAGMA foreign_key_list('{}')",
                quote_pragma_arg(table.bare_name())
            ),
            &[],
        )?;

        let mut grouped: std::collections::BTreeMap<i64, ForeignKeyMetadata> =
            std::collections::BTreeMap::new();
        for row in rows.iter() {
            let id = row.integer("id")?;
            let column = row.text("from")?;
            // NULL target column means the referenced table's primary key.
            let referenced_column = row.opt_text("to")?;
            let referenced_table = row.text("table")?;
            let on_delete = normalize_action(&row.text("on_delete")?);
            let on_update = normalize_action(&row.text("on_update")?);
            let entry = grouped.entry(id).or_insert_with(|| ForeignKeyMetadata {
                // SQLite constraints are anonymous; synthesize a stable name.
                name: format!("fk_{}_{}", table.bare_name(), id),
                columns: Vec::new(),
                referenced_table,
                referenced_columns: Vec::new(),
                on_delete,
                on_update,
            });
            entry.columns.push(column);
            if let Some(referenced_column) = referenced_column {
                entry.referenced_columns.push(referenced_column);
            }
        }

        let mut keys: Vec<ForeignKeyMetadata> = grouped.into_values().collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(keys)
    }

    fn check_constraints(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<CheckConstraintMetadata>> {
        let sql = match Self::table_sql(conn, table)? {
            Some(sql) => sql,
            None => return Ok(Vec::new()),
        };
        let mut checks = parse_check_constraints(&sql);
        checks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(checks)
    }

    fn generated_columns(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<GeneratedColumnMetadata>> {
        let rows = Self::xinfo(conn, table)?;
        let sql = Self::table_sql(conn, table)?;

        let mut generated = Vec::new();
        for row in rows.iter() {
            let hidden = row.opt_integer("hidden")?.unwrap_or(0);
            if hidden != 2 && hidden != 3 {
                continue;
            }
            let name = row.text("name")?;
            let expression = sql
                .as_deref()
                .and_then(|sql| generation_expression(sql, &name));
            generated.push(GeneratedColumnMetadata {
                name,
                expression,
                stored: hidden == 3,
            });
        }
        Ok(generated)
    }

    fn triggers(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<Vec<TriggerMetadata>> {
        let rows = conn.query(
            "SELECT name, sql FROM sqlite_master
             WHERE type = 'trigger' AND tbl_name = ? ORDER BY name",
            &[json!(table.bare_name())],
        )?;

        let mut triggers = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            triggers.push(TriggerMetadata {
                name: row.text("name")?,
                definition: row.opt_text("sql")?.unwrap_or_default(),
            });
        }
        Ok(triggers)
    }

    fn view_exists(
        &self,
        conn: &mut dyn SchemaConnection,
        table: &QualifiedName,
    ) -> DbResult<bool> {
        let rows = conn.query(
            "SELECT COUNT(*) AS matches FROM sqlite_master WHERE type = 'view' AND name = ?",
            &[json!(table.bare_name())],
        )?;
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
        if !self.view_exists(conn, table)? {
            return Ok(ViewDescriptor::absent());
        }
        Ok(ViewDescriptor {
            exists: true,
            kind: ViewKind::View,
            // Writable only through INSTEAD OF triggers; report read-only.
            updatable: false,
            dependencies: Vec::new(),
            refresh_strategy: None,
            last_refreshed: None,
        })
    }
}

/// Escape a name for embedding in a single-quoted PRAGMA argument.
fn quote_pragma_arg(name: &str) -> String {
    name.replace('\'', "''")
}

fn index_predicate(
    conn: &mut dyn SchemaConnection,
    index_name: &str,
) -> DbResult<Option<String>> {
    let rows = conn.query(
        "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = ?",
        &[json!(index_name)],
    )?;
    let sql = match rows.first() {
        Some(row) => row.opt_text("sql")?,
        None => None,
    };
    Ok(sql.as_deref().and_then(|sql| {
        INDEX_PREDICATE
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }))
}

/// Extract CHECK constraints from a `CREATE TABLE` statement. Unnamed
/// constraints get `check_N` names by declaration position.
fn parse_check_constraints(sql: &str) -> Vec<CheckConstraintMetadata> {
    let mut checks = Vec::new();
    for (position, caps) in CHECK_CONSTRAINT.captures_iter(sql).enumerate() {
        let open = match caps.get(0) {
            Some(m) => m.end() - 1,
            None => continue,
        };
        let expression = match balanced_slice(sql, open) {
            Some(expression) => expression.trim().to_string(),
            None => continue,
        };
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| format!("check_{}", position + 1));
        checks.push(CheckConstraintMetadata { name, expression });
    }
    checks
}

/// Find the generation expression for a known generated column by locating
/// its `AS (...)` clause in the table DDL. Best effort; returns nothing
/// when the DDL cannot be matched.
fn generation_expression(sql: &str, column: &str) -> Option<String> {
    let escaped = regex::escape(column);
    let pattern = format!(r#"(?is)(?:"{escaped}"|\b{escaped}\b).*?\bAS\s*\("#);
    let re = Regex::new(&pattern).ok()?;
    let found = re.find(sql)?;
    balanced_slice(sql, found.end() - 1).map(|expression| expression.trim().to_string())
}

/// Contents of the paren group opening at byte index `open`, skipping
/// parens inside quoted runs.
fn balanced_slice(text: &str, open: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth: i32 = 0;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[open + 1..i]);
                    }
                    if depth < 0 {
                        return None;
                    }
                }
                _ => {}
            },
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteConnection;

    #[test]
    fn test_logical_type_core_mappings() {
        assert_eq!(Sqlite.logical_type("INTEGER"), LogicalType::Integer);
        assert_eq!(Sqlite.logical_type("BIGINT"), LogicalType::BigInt);
        assert_eq!(Sqlite.logical_type("TINYINT"), LogicalType::SmallInt);
        assert_eq!(Sqlite.logical_type("VARCHAR(50)"), LogicalType::String);
        assert_eq!(Sqlite.logical_type("TEXT"), LogicalType::Text);
        assert_eq!(Sqlite.logical_type("BLOB"), LogicalType::Binary);
        assert_eq!(Sqlite.logical_type("REAL"), LogicalType::Float);
        assert_eq!(Sqlite.logical_type("NUMERIC(10,2)"), LogicalType::Decimal);
        assert_eq!(Sqlite.logical_type("BOOLEAN"), LogicalType::Boolean);
        assert_eq!(Sqlite.logical_type("DATETIME"), LogicalType::DateTime);
        assert_eq!(Sqlite.logical_type("DATE"), LogicalType::Date);
        assert_eq!(Sqlite.logical_type(""), LogicalType::Unknown);
    }

    #[test]
    fn test_balanced_slice() {
        assert_eq!(balanced_slice("(a + b)", 0), Some("a + b"));
        assert_eq!(balanced_slice("((a) + (b)) tail", 0), Some("(a) + (b)"));
        assert_eq!(balanced_slice("(name <> ')')", 0), Some("name <> ')'"));
        assert_eq!(balanced_slice("(unclosed", 0), None);
        assert_eq!(balanced_slice("x(a)", 0), None);
    }

    #[test]
    fn test_parse_check_constraints_named_and_unnamed() {
        let sql = r#"CREATE TABLE t (
            price INTEGER CHECK (price > 0),
            name TEXT,
            CONSTRAINT name_not_blank CHECK (length(trim(name)) > 0)
        )"#;
        let checks = parse_check_constraints(sql);
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name, "check_1");
        assert_eq!(checks[0].expression, "price > 0");
        assert_eq!(checks[1].name, "name_not_blank");
        assert_eq!(checks[1].expression, "length(trim(name)) > 0");
    }

    #[test]
    fn test_parse_check_constraints_paren_in_string() {
        let sql = "CREATE TABLE t (code TEXT CHECK (code <> '(none)'))";
        let checks = parse_check_constraints(sql);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].expression, "code <> '(none)'");
    }

    #[test]
    fn test_generation_expression() {
        let sql = "CREATE TABLE t (a INTEGER, b INTEGER GENERATED ALWAYS AS (a * 2) STORED)";
        assert_eq!(generation_expression(sql, "b"), Some("a * 2".to_string()));
        let short = "CREATE TABLE t (a INTEGER, doubled AS (a + a))";
        assert_eq!(
            generation_expression(short, "doubled"),
            Some("a + a".to_string())
        );
    }

    #[test]
    fn test_columns_and_primary_key_order_against_live_schema() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE order_items (
                 order_id INTEGER NOT NULL,
                 item_no INTEGER NOT NULL,
                 sku VARCHAR(20) NOT NULL,
                 quantity INTEGER NOT NULL DEFAULT 1,
                 PRIMARY KEY (order_id, item_no)
             )",
        )
        .unwrap();
        let mut conn = SqliteConnection::from_connection(conn, "test".to_string());
        let table = QualifiedName::parse("order_items");

        let columns = Sqlite.columns(&mut conn, &table).unwrap();
        assert_eq!(
            columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            ["order_id", "item_no", "sku", "quantity"]
        );
        assert_eq!(columns[2].limit, Some(20));
        assert_eq!(columns[3].default.as_deref(), Some("1"));
        assert!(!columns[0].nullable);

        let pk = Sqlite.primary_key(&mut conn, &table).unwrap();
        assert_eq!(pk, ["order_id", "item_no"]);
    }

    #[test]
    fn test_view_detection_against_live_schema() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE events (id INTEGER PRIMARY KEY, kind TEXT);
             CREATE VIEW recent_events AS SELECT * FROM events WHERE id > 100;",
        )
        .unwrap();
        let mut conn = SqliteConnection::from_connection(conn, "test".to_string());

        // A table named like a view is still a table.
        assert!(!Sqlite
            .view_exists(&mut conn, &QualifiedName::parse("events"))
            .unwrap());
        assert!(Sqlite
            .view_exists(&mut conn, &QualifiedName::parse("recent_events"))
            .unwrap());

        let info = Sqlite
            .view_info(&mut conn, &QualifiedName::parse("recent_events"))
            .unwrap();
        assert!(info.exists);
        assert_eq!(info.kind, ViewKind::View);
        assert!(!info.updatable);

        let missing = Sqlite
            .view_info(&mut conn, &QualifiedName::parse("nope"))
            .unwrap();
        assert!(!missing.exists);
    }
}

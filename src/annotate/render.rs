//! Rendering the primary schema dump.
//!
//! The dump is plain text meant to live inside a comment block: a header
//! with the table identity, the padded column listing, then indexes and
//! foreign keys. Lines never carry trailing whitespace and the result has
//! no trailing newline; the block codec handles comment prefixes.

use crate::config::AnnotationSettings;
use crate::schema::{ColumnMetadata, ForeignKeyMetadata, IndexMetadata, TableMetadata};

/// Render the primary schema text for one table.
#[must_use]
pub fn schema_dump(table: &TableMetadata, settings: &AnnotationSettings) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "table = \"{}\" ({})",
        table.name.qualified(),
        table.dialect
    ));

    if settings.show_storage {
        if let Some(line) = storage_line(table) {
            lines.push(line);
        }
    }

    match table.primary_key.len() {
        0 => {}
        1 => lines.push(format!("Primary Key: {}", table.primary_key[0])),
        _ => lines.push(format!("Primary Keys: {}", table.primary_key.join(", "))),
    }

    if !table.columns.is_empty() {
        lines.push(String::new());
        lines.extend(column_lines(table));
    }

    if settings.show_indexes && !table.indexes.is_empty() {
        lines.push(String::new());
        lines.push("Indexes:".to_string());
        lines.extend(index_lines(&table.indexes));
    }

    if settings.show_foreign_keys && !table.foreign_keys.is_empty() {
        lines.push(String::new());
        lines.push("Foreign Keys:".to_string());
        for fk in &table.foreign_keys {
            lines.push(format!("  {}", foreign_key_line(fk)));
        }
    }

    lines.join("\n")
}

fn storage_line(table: &TableMetadata) -> Option<String> {
    let storage = table.storage.as_ref()?;
    let mut parts: Vec<String> = Vec::new();
    if let Some(engine) = &storage.engine {
        parts.push(format!("engine={}", engine));
    }
    if let Some(charset) = &storage.charset {
        parts.push(format!("charset={}", charset));
    }
    if let Some(collation) = &storage.collation {
        parts.push(format!("collation={}", collation));
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("storage: {}", parts.join(", ")))
}

/// Column lines, padded so types and flags line up.
fn column_lines(table: &TableMetadata) -> Vec<String> {
    let cells: Vec<(String, String, String)> = table
        .columns
        .iter()
        .map(|column| {
            (
                column.name.clone(),
                type_cell(column),
                flags_cell(column, table),
            )
        })
        .collect();

    let name_width = cells.iter().map(|(name, _, _)| name.len()).max().unwrap_or(0);
    let type_width = cells.iter().map(|(_, cell, _)| cell.len()).max().unwrap_or(0);

    cells
        .into_iter()
        .map(|(name, cell, flags)| {
            format!("  {:<name_width$}  {:<type_width$}  {}", name, cell, flags)
                .trim_end()
                .to_string()
        })
        .collect()
}

fn type_cell(column: &ColumnMetadata) -> String {
    match column.limit {
        Some(limit) => format!("{}({})", column.logical_type.as_str(), limit),
        None => column.logical_type.as_str().to_string(),
    }
}

fn flags_cell(column: &ColumnMetadata, table: &TableMetadata) -> String {
    let mut flags: Vec<String> = Vec::new();
    if let Some(default) = &column.default {
        flags.push(format!("default({})", default));
    }
    if !column.nullable {
        flags.push("not null".to_string());
    }
    if table.primary_key.iter().any(|pk| pk == &column.name) {
        flags.push("primary key".to_string());
    }
    if column.generated {
        flags.push(generated_flag(column, table));
    }
    flags.join(", ")
}

fn generated_flag(column: &ColumnMetadata, table: &TableMetadata) -> String {
    match table
        .generated_columns
        .iter()
        .find(|generated| generated.name == column.name)
    {
        Some(generated) if generated.stored => "generated (stored)".to_string(),
        Some(_) => "generated (virtual)".to_string(),
        None => "generated".to_string(),
    }
}

fn index_lines(indexes: &[IndexMetadata]) -> Vec<String> {
    let width = indexes.iter().map(|index| index.name.len()).max().unwrap_or(0);
    indexes
        .iter()
        .map(|index| {
            let mut line = format!("  {:<width$}  ({})", index.name, index.columns.join(", "));
            if index.unique {
                line.push_str(" UNIQUE");
            }
            if let Some(predicate) = &index.where_clause {
                line.push_str(&format!(" WHERE {}", predicate));
            }
            line
        })
        .collect()
}

fn foreign_key_line(fk: &ForeignKeyMetadata) -> String {
    let mut line = format!(
        "{}  ({}) => {}",
        fk.name,
        fk.columns.join(", "),
        fk.referenced_table
    );
    if !fk.referenced_columns.is_empty() {
        line.push_str(&format!(" ({})", fk.referenced_columns.join(", ")));
    }
    if let Some(action) = &fk.on_delete {
        line.push_str(&format!("  on_delete: {}", action));
    }
    if let Some(action) = &fk.on_update {
        line.push_str(&format!("  on_update: {}", action));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Dialect, GeneratedColumnMetadata, LogicalType, QualifiedName, StorageMetadata,
    };

    fn column(name: &str, logical_type: LogicalType, nullable: bool) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            raw_type: logical_type.as_str().to_string(),
            logical_type,
            nullable,
            default: None,
            limit: None,
            generated: false,
        }
    }

    fn users_table() -> TableMetadata {
        let mut table =
            TableMetadata::empty(QualifiedName::parse("users"), Dialect::Sqlite);
        table.primary_key = vec!["id".to_string()];
        table.columns = vec![
            column("id", LogicalType::Integer, false),
            ColumnMetadata {
                limit: Some(255),
                ..column("email", LogicalType::String, false)
            },
            ColumnMetadata {
                default: Some("1".to_string()),
                ..column("active", LogicalType::Boolean, true)
            },
        ];
        table
    }

    #[test]
    fn test_dump_pads_columns_and_orders_flags() {
        let dump = schema_dump(&users_table(), &AnnotationSettings::default());
        assert_eq!(
            dump,
            "table = \"users\" (sqlite)\n\
             Primary Key: id\n\
             \n\
             \x20 id      integer      not null, primary key\n\
             \x20 email   string(255)  not null\n\
             \x20 active  boolean      default(1)"
        );
    }

    #[test]
    fn test_dump_with_storage_and_composite_key() {
        let mut table =
            TableMetadata::empty(QualifiedName::parse("orders"), Dialect::MySql);
        table.primary_key = vec!["order_id".to_string(), "line_number".to_string()];
        table.columns = vec![
            column("order_id", LogicalType::Integer, false),
            column("line_number", LogicalType::Integer, false),
        ];
        table.storage = Some(StorageMetadata {
            engine: Some("InnoDB".to_string()),
            charset: Some("utf8mb4".to_string()),
            collation: None,
        });
        table.indexes = vec![IndexMetadata {
            name: "idx_orders_on_order_id".to_string(),
            columns: vec!["order_id".to_string()],
            unique: false,
            where_clause: None,
        }];

        let dump = schema_dump(&table, &AnnotationSettings::default());
        insta::assert_snapshot!(dump, @r#"
        table = "orders" (mysql)
        storage: engine=InnoDB, charset=utf8mb4
        Primary Keys: order_id, line_number

          order_id     integer  not null, primary key
          line_number  integer  not null, primary key

        Indexes:
          idx_orders_on_order_id  (order_id)
        "#);
    }

    #[test]
    fn test_schema_qualified_name_renders_verbatim() {
        let table =
            TableMetadata::empty(QualifiedName::parse("audit.audit_logs"), Dialect::Postgres);
        let dump = schema_dump(&table, &AnnotationSettings::default());
        assert_eq!(dump, "table = \"audit.audit_logs\" (postgres)");
    }

    #[test]
    fn test_index_lines_mark_unique_and_predicate() {
        let indexes = vec![
            IndexMetadata {
                name: "idx_users_on_email".to_string(),
                columns: vec!["email".to_string()],
                unique: true,
                where_clause: None,
            },
            IndexMetadata {
                name: "idx_active".to_string(),
                columns: vec!["active".to_string()],
                unique: false,
                where_clause: Some("(active = 1)".to_string()),
            },
        ];
        let lines = index_lines(&indexes);
        assert_eq!(lines[0], "  idx_users_on_email  (email) UNIQUE");
        assert_eq!(lines[1], "  idx_active          (active) WHERE (active = 1)");
    }

    #[test]
    fn test_foreign_key_line_with_actions() {
        let fk = ForeignKeyMetadata {
            name: "fk_orders_user".to_string(),
            columns: vec!["user_id".to_string()],
            referenced_table: "users".to_string(),
            referenced_columns: vec!["id".to_string()],
            on_delete: Some("cascade".to_string()),
            on_update: None,
        };
        assert_eq!(
            foreign_key_line(&fk),
            "fk_orders_user  (user_id) => users (id)  on_delete: cascade"
        );
    }

    #[test]
    fn test_foreign_key_line_without_referenced_columns() {
        let fk = ForeignKeyMetadata {
            name: "fk_notes_author".to_string(),
            columns: vec!["author_id".to_string()],
            referenced_table: "people".to_string(),
            referenced_columns: Vec::new(),
            on_delete: None,
            on_update: None,
        };
        assert_eq!(foreign_key_line(&fk), "fk_notes_author  (author_id) => people");
    }

    #[test]
    fn test_generated_column_flag_reports_mode() {
        let mut table = users_table();
        table.columns.push(ColumnMetadata {
            generated: true,
            ..column("email_lower", LogicalType::String, true)
        });
        table.generated_columns = vec![GeneratedColumnMetadata {
            name: "email_lower".to_string(),
            expression: Some("lower(email)".to_string()),
            stored: true,
        }];
        let dump = schema_dump(&table, &AnnotationSettings::default());
        assert!(dump.contains("email_lower  string       generated (stored)"));
    }

    #[test]
    fn test_show_flags_hide_sections() {
        let mut table = users_table();
        table.indexes = vec![IndexMetadata {
            name: "idx".to_string(),
            columns: vec!["id".to_string()],
            unique: false,
            where_clause: None,
        }];
        let settings = AnnotationSettings {
            show_indexes: false,
            ..AnnotationSettings::default()
        };
        let dump = schema_dump(&table, &settings);
        assert!(!dump.contains("Indexes:"));
    }
}

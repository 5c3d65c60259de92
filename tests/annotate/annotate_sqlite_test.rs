use std::fs;
use std::path::{Path, PathBuf};

use marginalia::config::ConnectionSettings;
use marginalia::model::ModelInfo;
use marginalia::{BatchRunner, Settings};
use tempfile::TempDir;

fn seed_db(path: &Path, ddl: &str) {
    let conn = rusqlite::Connection::open(path).expect("create test db");
    conn.execute_batch(ddl).expect("seed test db");
}

fn write_model_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(format!("{}.rb", name.to_lowercase()));
    fs::write(&path, content).expect("write model file");
    path
}

fn manifest_entry(name: &str, file: PathBuf) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        table: None,
        file,
        connection: None,
        position: None,
        parent: None,
        inheritance_column: None,
        associations: Vec::new(),
        enums: Vec::new(),
        delegated_types: Vec::new(),
    }
}

fn test_settings(db_path: &Path, models: Vec<ModelInfo>) -> Settings {
    let mut settings = Settings::default();
    settings.connections.insert(
        "primary".to_string(),
        ConnectionSettings {
            adapter: "sqlite3".to_string(),
            url: db_path.to_str().expect("utf8 path").to_string(),
        },
    );
    settings.models = models;
    settings
}

#[test]
fn test_full_annotation_for_a_rich_table() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("app.sqlite3");
    seed_db(
        &db,
        "CREATE TABLE users (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             email VARCHAR(255) NOT NULL,
             nickname VARCHAR,
             active BOOLEAN NOT NULL,
             settings_flags INTEGER NOT NULL
         );
         CREATE UNIQUE INDEX idx_users_on_email ON users (email);",
    );
    let file = write_model_file(dir.path(), "User", "class User\nend\n");
    let settings = test_settings(&db, vec![manifest_entry("User", file.clone())]);

    let report = BatchRunner::new(settings).annotate_all().expect("annotate");
    assert_eq!(report.annotated(), 1);
    assert!(!report.has_failures());

    let annotated = fs::read_to_string(&file).expect("read back");

    // Schema dump header and columns.
    assert!(annotated.contains("table = \"users\" (sqlite)"));
    assert!(annotated.contains("Primary Key: id"));
    assert!(annotated.contains("string(255)"));
    assert!(annotated.contains("not null"));

    // Index listing with the unique flag.
    assert!(annotated.contains("Indexes:"));
    assert!(annotated.contains("idx_users_on_email  (email) UNIQUE"));

    // Advisory notes from the column heuristics.
    assert!(annotated.contains("== Notes"));
    assert!(annotated.contains("nickname:LIMIT"));
    assert!(annotated.contains("active:DEFAULT"));
    assert!(annotated.contains("settings_flags:NOT_NULL"));
    // The limited, defaulted columns stay quiet.
    assert!(!annotated.contains("email:LIMIT"));
}

#[test]
fn test_composite_primary_key_is_listed_in_order() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("app.sqlite3");
    seed_db(
        &db,
        "CREATE TABLE order_items (
             order_id INTEGER NOT NULL,
             line_number INTEGER NOT NULL,
             sku VARCHAR(20) NOT NULL,
             PRIMARY KEY (order_id, line_number)
         );",
    );
    let file = write_model_file(dir.path(), "OrderItem", "class OrderItem\nend\n");
    let settings = test_settings(&db, vec![manifest_entry("OrderItem", file.clone())]);

    let report = BatchRunner::new(settings).annotate_all().expect("annotate");
    assert_eq!(report.annotated(), 1);

    let annotated = fs::read_to_string(&file).expect("read back");
    assert!(annotated.contains("Primary Keys: order_id, line_number"));
    assert!(annotated.contains("== Composite Primary Key"));
    assert!(annotated.contains("order_id, line_number"));
}

#[test]
fn test_model_backed_by_view_reports_read_only() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("app.sqlite3");
    seed_db(
        &db,
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, placed_at DATETIME);
         CREATE VIEW recent_orders AS
             SELECT * FROM orders WHERE placed_at > '2024-01-01';",
    );
    let file = write_model_file(dir.path(), "RecentOrder", "class RecentOrder\nend\n");
    let settings = test_settings(&db, vec![manifest_entry("RecentOrder", file.clone())]);

    let report = BatchRunner::new(settings).annotate_all().expect("annotate");
    assert_eq!(report.annotated(), 1);

    let annotated = fs::read_to_string(&file).expect("read back");
    assert!(annotated.contains("table = \"recent_orders\" (sqlite)"));
    assert!(annotated.contains("== View"));
    assert!(annotated.contains("kind: view"));
    assert!(annotated.contains("updatable: no"));
    assert!(annotated.contains("recent_orders:READ_ONLY"));
    // Plain views never get the staleness note.
    assert!(!annotated.contains("STALE"));
}

#[test]
fn test_table_named_like_a_view_is_still_a_table() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("app.sqlite3");
    seed_db(
        &db,
        "CREATE TABLE triggers (id INTEGER PRIMARY KEY, fired_at DATETIME);",
    );
    let file = write_model_file(dir.path(), "Trigger", "class Trigger\nend\n");
    let settings = test_settings(&db, vec![manifest_entry("Trigger", file.clone())]);

    let report = BatchRunner::new(settings).annotate_all().expect("annotate");
    assert_eq!(report.annotated(), 1);

    let annotated = fs::read_to_string(&file).expect("read back");
    assert!(annotated.contains("table = \"triggers\" (sqlite)"));
    assert!(!annotated.contains("== View"));
    assert!(!annotated.contains("READ_ONLY"));
}

#[test]
fn test_file_without_trailing_newline_round_trips() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("app.sqlite3");
    seed_db(&db, "CREATE TABLE users (id INTEGER PRIMARY KEY);");
    let original = "class User\nend";
    let file = write_model_file(dir.path(), "User", original);
    let settings = test_settings(&db, vec![manifest_entry("User", file.clone())]);

    let runner = BatchRunner::new(settings);

    let report = runner.annotate_all().expect("annotate");
    assert_eq!(report.annotated(), 1);
    let annotated = fs::read_to_string(&file).expect("read back");
    assert!(!annotated.ends_with('\n'), "trailing-newline convention must hold");

    // A second run changes nothing, byte for byte.
    let second = runner.annotate_all().expect("annotate again");
    assert_eq!(second.unchanged(), 1);
    assert_eq!(fs::read_to_string(&file).expect("read back"), annotated);

    // Removal restores the original bytes exactly.
    let removed = runner.remove_all().expect("remove");
    assert_eq!(removed.removed(), 1);
    assert_eq!(fs::read_to_string(&file).expect("read back"), original);
}

#[test]
fn test_models_spread_across_two_databases() {
    let dir = TempDir::new().expect("tempdir");
    let app_db = dir.path().join("app.sqlite3");
    let reporting_db = dir.path().join("reporting.sqlite3");
    seed_db(&app_db, "CREATE TABLE users (id INTEGER PRIMARY KEY);");
    seed_db(
        &reporting_db,
        "CREATE TABLE audit_logs (id INTEGER PRIMARY KEY, action VARCHAR(32) NOT NULL);",
    );

    let users = write_model_file(dir.path(), "User", "class User\nend\n");
    let audits = write_model_file(dir.path(), "AuditLog", "class AuditLog\nend\n");

    let mut audit_entry = manifest_entry("AuditLog", audits.clone());
    audit_entry.connection = Some("reporting".to_string());

    let mut settings = test_settings(&app_db, vec![manifest_entry("User", users), audit_entry]);
    settings.connections.insert(
        "reporting".to_string(),
        ConnectionSettings {
            adapter: "sqlite3".to_string(),
            url: reporting_db.to_str().expect("utf8 path").to_string(),
        },
    );

    let report = BatchRunner::new(settings).annotate_all().expect("annotate");
    assert_eq!(report.annotated(), 2);
    assert!(!report.has_failures());

    let audit_annotated = fs::read_to_string(&audits).expect("read back");
    assert!(audit_annotated.contains("table = \"audit_logs\" (sqlite)"));
    assert!(audit_annotated.contains("string(32)"));
}

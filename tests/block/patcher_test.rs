use std::fs;
use std::path::PathBuf;

use marginalia::block::{AnnotationError, BlockCodec, FilePatcher, Placement};
use marginalia::config::AnnotationSettings;
use tempfile::TempDir;

fn patcher() -> FilePatcher {
    FilePatcher::new(BlockCodec::from_settings(&AnnotationSettings::default()))
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_insert_then_remove_restores_bytes() {
    let dir = TempDir::new().unwrap();
    let patcher = patcher();

    // Both trailing-newline conventions must survive untouched.
    for (name, original) in [
        ("with_newline.rb", "class User\nend\n"),
        ("without_newline.rb", "class User\nend"),
    ] {
        let path = write_file(&dir, name, original);

        assert!(patcher.insert(&path, Placement::Top, "Table: users").unwrap());
        let annotated = fs::read_to_string(&path).unwrap();
        assert!(annotated.starts_with("# == Schema Annotation ==\n"));
        assert_eq!(annotated.ends_with('\n'), original.ends_with('\n'));

        assert!(patcher.remove(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }
}

#[test]
fn test_reannotating_same_body_does_not_rewrite_the_file() {
    let dir = TempDir::new().unwrap();
    let patcher = patcher();
    let path = write_file(&dir, "user.rb", "class User\nend\n");

    assert!(patcher.insert(&path, Placement::Top, "Table: users").unwrap());
    let annotated = fs::read_to_string(&path).unwrap();
    let mtime = fs::metadata(&path).unwrap().modified().unwrap();

    // Same body again: no write, so the mtime survives.
    assert!(!patcher.insert(&path, Placement::Top, "Table: users").unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), annotated);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime);
}

#[test]
fn test_insert_lands_below_shebang_and_magic_comments() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "script.rb",
        "#!/usr/bin/env ruby\n# frozen_string_literal: true\nclass User\nend\n",
    );

    patcher().insert(&path, Placement::Top, "Table: users").unwrap();
    let annotated = fs::read_to_string(&path).unwrap();
    assert_eq!(
        annotated,
        "#!/usr/bin/env ruby\n\
         # frozen_string_literal: true\n\
         # == Schema Annotation ==\n\
         # Table: users\n\
         # == End Schema Annotation ==\n\
         \n\
         class User\nend\n"
    );
}

#[test]
fn test_class_placement_keeps_doc_comment_attached() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "user.rb",
        "require \"active_record\"\n\n# Accounts that can sign in.\nclass User\nend\n",
    );

    patcher()
        .insert(&path, Placement::ClassDefinition("User"), "Table: users")
        .unwrap();
    let annotated = fs::read_to_string(&path).unwrap();
    // The block sits above the doc comment, not between it and the class.
    assert_eq!(
        annotated,
        "require \"active_record\"\n\
         \n\
         # == Schema Annotation ==\n\
         # Table: users\n\
         # == End Schema Annotation ==\n\
         \n\
         # Accounts that can sign in.\n\
         class User\nend\n"
    );
}

#[test]
fn test_stale_block_is_replaced_in_place() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "user.rb",
        "# == Schema Annotation ==\n\
         # Table: users\n\
         #   name  :string\n\
         # == End Schema Annotation ==\n\
         \n\
         class User\nend\n",
    );

    patcher()
        .insert(&path, Placement::Top, "Table: users\n  name   :string\n  email  :string")
        .unwrap();
    let annotated = fs::read_to_string(&path).unwrap();
    assert_eq!(
        annotated.matches("# == Schema Annotation ==").count(),
        1,
        "replacement must not stack blocks"
    );
    assert!(annotated.contains("#   email  :string"));
    assert!(annotated.ends_with("class User\nend\n"));
}

#[test]
fn test_preview_insert_leaves_the_file_alone() {
    let dir = TempDir::new().unwrap();
    let original = "class User\nend\n";
    let path = write_file(&dir, "user.rb", original);

    let (patched, changed) = patcher()
        .preview_insert(&path, Placement::Top, "Table: users")
        .unwrap();
    assert!(changed);
    assert!(patched.starts_with("# == Schema Annotation ==\n"));
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn test_remove_without_block_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let original = "class User\nend\n";
    let path = write_file(&dir, "user.rb", original);

    assert!(!patcher().remove(&path).unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn test_class_not_found_names_class_and_path() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "other.rb", "class Other\nend\n");

    let err = patcher()
        .insert(&path, Placement::ClassDefinition("User"), "body")
        .unwrap_err();
    assert!(matches!(err, AnnotationError::ClassNotFound { .. }));
    let message = err.to_string();
    assert!(message.contains("class definition 'User'"));
    assert!(message.contains("other.rb"));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vanished.rb");

    let err = patcher().insert(&path, Placement::Top, "body").unwrap_err();
    assert!(matches!(err, AnnotationError::Read { .. }));
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn test_custom_markers_round_trip_on_disk() {
    let dir = TempDir::new().unwrap();
    let original = "defmodule Account do\nend\n";
    let path = write_file(&dir, "account.ex", original);

    let patcher = FilePatcher::new(BlockCodec::new("##", "SCHEMA", "END SCHEMA"));
    assert!(patcher.insert(&path, Placement::Top, "Table: accounts").unwrap());
    let annotated = fs::read_to_string(&path).unwrap();
    assert!(annotated.starts_with("## SCHEMA\n## Table: accounts\n## END SCHEMA\n"));

    assert!(patcher.remove(&path).unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

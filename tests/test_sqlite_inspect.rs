//! Live catalog export over a SQLite file
//!
//! Seeds a scratch database through rusqlite, inspects it, and verifies
//! the DBML artifact. Covers the prefix handling and the foreign-key
//! pragma fallback end to end.

use rusqlite::Connection;
use schemadoc::export::{ExportSource, Exporter};
use schemadoc::inspect::{SchemaInspector, SqliteSource};
use std::fs;
use std::path::Path;

fn seed(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE app_users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email VARCHAR(191) NOT NULL,
            display_name TEXT,
            plan TEXT NOT NULL DEFAULT 'free'
        );
        CREATE UNIQUE INDEX app_users_email_unique ON app_users(email);

        CREATE TABLE app_posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title VARCHAR(120) NOT NULL,
            published BOOLEAN NOT NULL DEFAULT 0,
            FOREIGN KEY (user_id) REFERENCES app_users(id) ON DELETE CASCADE
        );
        CREATE INDEX app_posts_user_id_index ON app_posts(user_id);
        "#,
    )
    .unwrap();
}

#[test]
fn test_sqlite_catalog_exports_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("app.sqlite");
    seed(&db_path);

    let source = SqliteSource::open(&db_path).unwrap();
    let inspector = SchemaInspector::with_prefix(Box::new(source), "app_");

    let exporter = Exporter::new("app", "sqlite", dir.path().join("out"));
    let outcome = exporter.run(ExportSource::Catalog(inspector)).unwrap();

    assert!(!outcome.degraded);
    assert_eq!(outcome.tables, 2);

    let text = fs::read_to_string(outcome.artifact.unwrap()).unwrap();
    assert!(text.starts_with("Project app {"));
    assert!(text.contains("database_type: 'sqlite'"));

    // Table labels keep the physical prefix
    assert!(text.contains("Table app_users {"));
    assert!(text.contains("Table app_posts {"));

    assert!(text.contains("\tid integer [pk, unique, not null]\n"));
    assert!(text.contains("\temail varchar(191) [unique, not null]\n"));
    assert!(text.contains("\tdisplay_name text [null]\n"));
    assert!(text.contains("\tplan text [not null, default: 'free']\n"));
    assert!(text.contains("\tpublished boolean [not null, default: 0]\n"));

    assert!(text.contains("\t\t(email) [unique]\n"));
    assert!(text.contains("\t\t(user_id)\n"));

    // Foreign keys come from the pragma fallback and point at the label
    assert!(text.contains("Ref: app_posts.user_id > app_users.id [delete: cascade]\n"));

    assert_eq!(text.matches('{').count(), text.matches('}').count());
}

#[test]
fn test_prefix_strips_canonical_keys_only() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("app.sqlite");
    seed(&db_path);

    let source = SqliteSource::open(&db_path).unwrap();
    let mut inspector = SchemaInspector::with_prefix(Box::new(source), "app_");
    let tables = inspector.tables().unwrap();

    assert!(tables.contains_key("users"));
    assert!(tables.contains_key("posts"));
    assert_eq!(tables.get("users").unwrap().name, "app_users");

    let posts = tables.get("posts").unwrap();
    let fk = posts.foreign_keys.values().next().unwrap();
    assert_eq!(fk.target_table, "app_users");
    assert_eq!(fk.target_columns, vec!["id".to_string()]);
}

#[test]
fn test_console_listings_from_live_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("app.sqlite");
    seed(&db_path);

    let source = SqliteSource::open(&db_path).unwrap();
    let inspector = SchemaInspector::with_prefix(Box::new(source), "app_");

    let exporter = Exporter::new("app", "sqlite", dir.path().join("out"));
    let (project, docs) = exporter
        .documents(ExportSource::Catalog(inspector))
        .unwrap();

    assert_eq!(project.name, "app");
    assert_eq!(project.driver, "sqlite");

    let posts = docs.iter().find(|d| d.name == "app_posts").unwrap();
    assert!(posts.column_listing().contains("name : title"));
    assert!(posts.index_listing().contains("unique : no"));
    assert_eq!(
        posts.relation_listing(),
        "[app_posts][user_id] -> [id] of [app_users]"
    );
}

use lifecycle_core::db::migrations::latest_version;
use lifecycle_core::db::schema::{foreign_keys, table_exists};
use lifecycle_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "accounts",
        "people",
        "profiles",
        "contacts",
        "aspect_memberships",
        "share_visibilities",
        "invitation_codes",
        "posts",
        "notification_actors",
        "account_migrations",
    ] {
        assert!(table_exists(&conn, table).unwrap(), "table {table} does not exist");
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert!(table_exists(&conn_second, "accounts").unwrap());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn opened_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();

    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO contacts (account_id, person_id) VALUES (41, 42);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn foreign_key_introspection_sees_keys_on_both_sides() {
    let conn = open_db_in_memory().unwrap();

    let touching: Vec<_> = foreign_keys(&conn)
        .unwrap()
        .into_iter()
        .filter(|key| key.table == "accounts" || key.references == "accounts")
        .collect();
    let has = |table: &str, column: &str| {
        touching
            .iter()
            .any(|key| key.table == table && key.column == column)
    };

    assert!(has("contacts", "account_id"));
    assert!(has("people", "owner_id"));
    assert!(has("accounts", "auto_follow_back_aspect_id"));
    assert!(has("accounts", "invited_by_id"));
    assert!(!has("posts", "author_id"));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

use std::path::PathBuf;
use std::sync::OnceLock;

use rusqlite::Connection;

use crate::adapters::db::{
    NewSessionRecord, NewUserRecord, insert_session, insert_user, open_connection, run_migrations,
};

/// Copies a once-migrated template into a fresh temp file and opens it.
pub fn open_test_connection(test_name: &str) -> Connection {
    let template = migrated_template();
    let db_path = temp_path(&format!("{test_name}.sqlite"));

    std::fs::copy(template, &db_path).expect("template db should be copied");
    open_connection(db_path.to_string_lossy().as_ref()).expect("test db should open")
}

pub fn seed_user(connection: &Connection, first_name: &str, last_name: &str, deleted: bool) -> i64 {
    insert_user(
        connection,
        &NewUserRecord {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            deleted,
        },
    )
    .expect("user insert should succeed")
}

pub fn seed_session(
    connection: &Connection,
    user_id: i64,
    device_type: i64,
    started_at_utc: &str,
    ended_at_utc: Option<&str>,
) -> i64 {
    insert_session(
        connection,
        &NewSessionRecord {
            started_at_utc: started_at_utc.to_string(),
            ended_at_utc: ended_at_utc.map(ToString::to_string),
            device_type,
            user_id,
        },
    )
    .expect("session insert should succeed")
}

/// Lets a test insert sessions that point at missing users.
pub fn disable_foreign_keys(connection: &Connection) {
    connection
        .pragma_update(None, "foreign_keys", false)
        .expect("foreign keys should be switchable");
}

fn migrated_template() -> &'static PathBuf {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH.get_or_init(|| {
        let template_path = temp_path("analytics-template.sqlite");
        let mut connection = open_connection(template_path.to_string_lossy().as_ref())
            .expect("template db opens");
        run_migrations(&mut connection).expect("template migrations should succeed");
        template_path
    })
}

fn temp_path(file_name: &str) -> PathBuf {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join(file_name);
    std::mem::forget(dir);
    path
}

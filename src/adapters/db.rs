use rusqlite::{Connection, Row, params};
use thiserror::Error;

use crate::domain::models::{DeviceType, SessionRow, User};

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY,
    started_at_utc TEXT NOT NULL,
    ended_at_utc TEXT,
    device_type INTEGER NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users (id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_device_type_started_at
ON sessions (device_type, started_at_utc);

CREATE INDEX IF NOT EXISTS idx_sessions_user_id
ON sessions (user_id);
"#,
)];

/// Timestamp layout used when binding cutoffs and writing fixtures.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SESSION_COLUMNS: &str = "s.id AS id, s.started_at_utc AS started_at_utc,
            s.ended_at_utc AS ended_at_utc, s.device_type AS device_type, s.user_id AS user_id,
            u.first_name || ' ' || u.last_name AS user_full_name";

const USER_COLUMNS: &str = "u.id AS id, u.first_name AS first_name, u.last_name AS last_name,
            u.deleted AS deleted";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    Connection::open(path).map_err(DbError::from)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Earliest session of `device_type`, ties broken by lowest session id.
pub fn first_session_by_device_type(
    connection: &Connection,
    device_type: DeviceType,
) -> Result<Option<SessionRow>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {SESSION_COLUMNS}
         FROM sessions s
         LEFT JOIN users u ON u.id = s.user_id
         WHERE s.device_type = ?1
         ORDER BY julianday(s.started_at_utc) ASC, s.id ASC
         LIMIT 1"
    ))?;

    let mut rows = statement.query(params![device_type.code()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(session_row(row)?));
    }

    Ok(None)
}

/// Sessions of non-deleted users that ended strictly before `cutoff`, newest start first.
///
/// Open sessions are excluded. Sessions whose user row is missing, or whose end
/// cannot be read as a timestamp, are kept so the mapper can report them.
pub fn sessions_ended_before_for_active_users(
    connection: &Connection,
    cutoff: &str,
) -> Result<Vec<SessionRow>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {SESSION_COLUMNS}
         FROM sessions s
         LEFT JOIN users u ON u.id = s.user_id
         WHERE s.device_type IN (?1, ?2)
           AND (u.id IS NULL OR u.deleted = 0)
           AND s.ended_at_utc IS NOT NULL
           AND (julianday(s.ended_at_utc) IS NULL OR julianday(s.ended_at_utc) < julianday(?3))
         ORDER BY julianday(s.started_at_utc) DESC, s.id DESC"
    ))?;

    let rows = statement.query_map(
        params![DeviceType::Mobile.code(), DeviceType::Desktop.code(), cutoff],
        session_row,
    )?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }

    Ok(sessions)
}

/// User owning the most sessions; equal counts resolve to the lowest user id.
pub fn user_with_most_sessions(connection: &Connection) -> Result<Option<User>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {USER_COLUMNS}
         FROM users u
         INNER JOIN sessions s ON s.user_id = u.id
         GROUP BY u.id
         ORDER BY COUNT(s.id) DESC, u.id ASC
         LIMIT 1"
    ))?;

    let mut rows = statement.query([])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(user(row)?));
    }

    Ok(None)
}

/// Distinct users with a session of `device_type`, ordered by their latest such
/// session start, newest first; equal starts resolve to the lowest user id.
pub fn users_with_session_of_device_type(
    connection: &Connection,
    device_type: DeviceType,
) -> Result<Vec<User>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {USER_COLUMNS}
         FROM users u
         INNER JOIN sessions s ON s.user_id = u.id
         WHERE s.device_type = ?1
         GROUP BY u.id
         ORDER BY MAX(julianday(s.started_at_utc)) DESC, u.id ASC"
    ))?;

    let rows = statement.query_map(params![device_type.code()], user)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }

    Ok(users)
}

fn session_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get("id")?,
        started_at_utc: row.get("started_at_utc")?,
        ended_at_utc: row.get("ended_at_utc")?,
        device_type: row.get("device_type")?,
        user_id: row.get("user_id")?,
        user_full_name: row.get("user_full_name")?,
    })
}

fn user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        deleted: row.get("deleted")?,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUserRecord {
    pub first_name: String,
    pub last_name: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionRecord {
    pub started_at_utc: String,
    pub ended_at_utc: Option<String>,
    pub device_type: i64,
    pub user_id: i64,
}

pub fn insert_user(connection: &Connection, new_user: &NewUserRecord) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO users (first_name, last_name, deleted) VALUES (?1, ?2, ?3)",
        params![new_user.first_name, new_user.last_name, new_user.deleted],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn insert_session(
    connection: &Connection,
    new_session: &NewSessionRecord,
) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO sessions (started_at_utc, ended_at_utc, device_type, user_id) VALUES (?1, ?2, ?3, ?4)",
        params![
            new_session.started_at_utc,
            new_session.ended_at_utc,
            new_session.device_type,
            new_session.user_id,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

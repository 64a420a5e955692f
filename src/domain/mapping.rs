use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::models::{
    DeviceType, SessionResponse, SessionRow, UnknownDeviceType, User, UserResponse,
};

/// Narrower than what SQLite's `julianday()` accepts: date-only values, missing
/// seconds and `now` sort in queries but fail here.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("session {session_id}: {source}")]
    UnknownDeviceType {
        session_id: i64,
        #[source]
        source: UnknownDeviceType,
    },
    #[error("session {session_id} references missing user {user_id}")]
    MissingUser { session_id: i64, user_id: i64 },
    #[error("session {session_id} has malformed {column} value {value:?}")]
    MalformedTimestamp {
        session_id: i64,
        column: &'static str,
        value: String,
    },
    #[error("session {session_id} ends before it starts")]
    EndedBeforeStarted { session_id: i64 },
}

pub fn map_session_row(row: SessionRow) -> Result<SessionResponse, MappingError> {
    let session_id = row.id;

    let device_type = DeviceType::from_code(row.device_type)
        .map_err(|source| MappingError::UnknownDeviceType { session_id, source })?;

    let user_full_name = row.user_full_name.ok_or(MappingError::MissingUser {
        session_id,
        user_id: row.user_id,
    })?;

    let started_at_utc = parse_timestamp(session_id, "started_at_utc", &row.started_at_utc)?;
    let ended_at_utc = row
        .ended_at_utc
        .as_deref()
        .map(|value| parse_timestamp(session_id, "ended_at_utc", value))
        .transpose()?;

    if let Some(ended_at_utc) = ended_at_utc
        && ended_at_utc < started_at_utc
    {
        return Err(MappingError::EndedBeforeStarted { session_id });
    }

    Ok(SessionResponse {
        id: session_id,
        started_at_utc,
        ended_at_utc,
        device_type,
        user_id: row.user_id,
        user_full_name,
    })
}

/// Maps every row in order, stopping at the first failure.
pub fn map_session_rows(rows: Vec<SessionRow>) -> Result<Vec<SessionResponse>, MappingError> {
    rows.into_iter().map(map_session_row).collect()
}

pub fn map_user(user: User) -> UserResponse {
    UserResponse {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        deleted: user.deleted,
    }
}

fn parse_timestamp(
    session_id: i64,
    column: &'static str,
    value: &str,
) -> Result<NaiveDateTime, MappingError> {
    let trimmed = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| MappingError::MalformedTimestamp {
            session_id,
            column,
            value: value.to_string(),
        })
}

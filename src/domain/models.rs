use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

/// Device that originated a session. Stored as an integer code in `sessions.device_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown device type code {0}")]
pub struct UnknownDeviceType(pub i64);

impl DeviceType {
    pub const ALL: [DeviceType; 2] = [DeviceType::Mobile, DeviceType::Desktop];

    pub fn code(self) -> i64 {
        match self {
            Self::Mobile => 1,
            Self::Desktop => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, UnknownDeviceType> {
        match code {
            1 => Ok(Self::Mobile),
            2 => Ok(Self::Desktop),
            other => Err(UnknownDeviceType(other)),
        }
    }
}

impl TryFrom<i64> for DeviceType {
    type Error = UnknownDeviceType;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub deleted: bool,
}

/// One row of a session query, decoded by column name but not yet validated.
///
/// `user_full_name` is `None` when the joined user row is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: i64,
    pub started_at_utc: String,
    pub ended_at_utc: Option<String>,
    pub device_type: i64,
    pub user_id: i64,
    pub user_full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: i64,
    pub started_at_utc: NaiveDateTime,
    pub ended_at_utc: Option<NaiveDateTime>,
    pub device_type: DeviceType,
    pub user_id: i64,
    pub user_full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub deleted: bool,
}

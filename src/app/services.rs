use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::DbError;
use crate::domain::mapping::{MappingError, map_session_row, map_session_rows, map_user};
use crate::domain::models::{DeviceType, SessionResponse, UserResponse};

pub const FIRST_SESSION_DEVICE_TYPE: DeviceType = DeviceType::Desktop;
pub const USERS_WITH_SESSION_DEVICE_TYPE: DeviceType = DeviceType::Mobile;

/// Sessions must have ended strictly before this instant (2025-01-01T00:00:00 UTC).
pub fn sessions_cutoff() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{operation}: no matching record")]
    NotFound { operation: &'static str },
    #[error("{operation}({params}): failed to map row: {source}")]
    Mapping {
        operation: &'static str,
        params: String,
        #[source]
        source: MappingError,
    },
    #[error("{operation}({params}): {source}")]
    Database {
        operation: &'static str,
        params: String,
        #[source]
        source: DbError,
    },
    #[error("{operation}: database lock poisoned")]
    DbLockPoisoned { operation: &'static str },
}

pub trait AnalyticsQueryHandler {
    fn get_first_desktop_session(&self) -> Result<SessionResponse, ServiceError>;
    fn get_sessions_from_active_users_ended_before_cutoff(
        &self,
    ) -> Result<Vec<SessionResponse>, ServiceError>;
    fn get_user_with_most_sessions(&self) -> Result<UserResponse, ServiceError>;
    fn get_users_with_at_least_one_mobile_session(
        &self,
    ) -> Result<Vec<UserResponse>, ServiceError>;
}

#[derive(Clone)]
pub struct SqliteAnalyticsService {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteAnalyticsService {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        operation: &'static str,
        params: &str,
        op: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, ServiceError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| ServiceError::DbLockPoisoned { operation })?;
        op(&connection).map_err(|source| ServiceError::Database {
            operation,
            params: params.to_string(),
            source,
        })
    }
}

impl AnalyticsQueryHandler for SqliteAnalyticsService {
    fn get_first_desktop_session(&self) -> Result<SessionResponse, ServiceError> {
        const OPERATION: &str = "first_desktop_session";
        let params = format!("device_type={}", FIRST_SESSION_DEVICE_TYPE.code());

        let row = self
            .with_connection(OPERATION, &params, |connection| {
                db::first_session_by_device_type(connection, FIRST_SESSION_DEVICE_TYPE)
            })?
            .ok_or(ServiceError::NotFound {
                operation: OPERATION,
            })?;

        let session = map_session_row(row).map_err(|source| ServiceError::Mapping {
            operation: OPERATION,
            params,
            source,
        })?;

        tracing::debug!(
            operation = OPERATION,
            session_id = session.id,
            "resolved first session"
        );
        Ok(session)
    }

    fn get_sessions_from_active_users_ended_before_cutoff(
        &self,
    ) -> Result<Vec<SessionResponse>, ServiceError> {
        const OPERATION: &str = "sessions_from_active_users_ended_before_cutoff";
        let cutoff = sessions_cutoff().format(db::TIMESTAMP_FORMAT).to_string();
        let params = format!("cutoff={cutoff}");

        let rows = self.with_connection(OPERATION, &params, |connection| {
            db::sessions_ended_before_for_active_users(connection, &cutoff)
        })?;

        let sessions = map_session_rows(rows).map_err(|source| ServiceError::Mapping {
            operation: OPERATION,
            params,
            source,
        })?;

        tracing::debug!(
            operation = OPERATION,
            %cutoff,
            rows = sessions.len(),
            "listed sessions"
        );
        Ok(sessions)
    }

    fn get_user_with_most_sessions(&self) -> Result<UserResponse, ServiceError> {
        const OPERATION: &str = "user_with_most_sessions";

        let user = self
            .with_connection(OPERATION, "", db::user_with_most_sessions)?
            .map(map_user)
            .ok_or(ServiceError::NotFound {
                operation: OPERATION,
            })?;

        tracing::debug!(operation = OPERATION, user_id = user.id, "resolved user");
        Ok(user)
    }

    fn get_users_with_at_least_one_mobile_session(
        &self,
    ) -> Result<Vec<UserResponse>, ServiceError> {
        const OPERATION: &str = "users_with_at_least_one_mobile_session";
        let params = format!("device_type={}", USERS_WITH_SESSION_DEVICE_TYPE.code());

        let users: Vec<UserResponse> = self
            .with_connection(OPERATION, &params, |connection| {
                db::users_with_session_of_device_type(connection, USERS_WITH_SESSION_DEVICE_TYPE)
            })?
            .into_iter()
            .map(map_user)
            .collect();

        tracing::debug!(operation = OPERATION, rows = users.len(), "listed users");
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use crate::domain::mapping::MappingError;
    use crate::domain::models::DeviceType;
    use crate::test_support::{disable_foreign_keys, open_test_connection, seed_session, seed_user};

    use super::{AnalyticsQueryHandler, ServiceError, SqliteAnalyticsService, sessions_cutoff};

    fn build_service(name: &str) -> (SqliteAnalyticsService, Arc<Mutex<Connection>>) {
        let connection = Arc::new(Mutex::new(open_test_connection(name)));
        (
            SqliteAnalyticsService::new(Arc::clone(&connection)),
            connection,
        )
    }

    #[test]
    fn cutoff_is_start_of_2025() {
        assert_eq!(sessions_cutoff().to_string(), "2025-01-01 00:00:00");
    }

    #[test]
    fn empty_store_yields_not_found_or_empty() {
        let (service, _) = build_service("service-empty");

        assert!(matches!(
            service.get_first_desktop_session(),
            Err(ServiceError::NotFound {
                operation: "first_desktop_session"
            })
        ));
        assert!(
            service
                .get_sessions_from_active_users_ended_before_cutoff()
                .expect("listing should succeed")
                .is_empty()
        );
        assert!(matches!(
            service.get_user_with_most_sessions(),
            Err(ServiceError::NotFound {
                operation: "user_with_most_sessions"
            })
        ));
        assert!(
            service
                .get_users_with_at_least_one_mobile_session()
                .expect("listing should succeed")
                .is_empty()
        );
    }

    #[test]
    fn first_desktop_session_maps_joined_row() {
        let (service, connection) = build_service("service-first-desktop");
        let expected_id = {
            let db = connection.lock().expect("lock should be available");
            let user_id = seed_user(&db, "Ada", "Lovelace", false);
            seed_session(&db, user_id, 1, "2023-01-01 00:00:00", None);
            seed_session(
                &db,
                user_id,
                2,
                "2024-01-02 00:00:00",
                Some("2024-01-02 01:00:00"),
            );
            seed_session(
                &db,
                user_id,
                2,
                "2024-01-01 00:00:00",
                Some("2024-01-01 01:00:00"),
            )
        };

        let session = service
            .get_first_desktop_session()
            .expect("session should be found");

        assert_eq!(session.id, expected_id);
        assert_eq!(session.device_type, DeviceType::Desktop);
        assert_eq!(session.user_full_name, "Ada Lovelace");
    }

    #[test]
    fn first_desktop_session_reports_orphaned_session_as_mapping_failure() {
        let (service, connection) = build_service("service-orphan");
        {
            let db = connection.lock().expect("lock should be available");
            disable_foreign_keys(&db);
            seed_session(&db, 99, 2, "2024-01-01 00:00:00", None);
        }

        let error = service
            .get_first_desktop_session()
            .expect_err("orphaned session should fail");

        assert!(matches!(
            error,
            ServiceError::Mapping {
                source: MappingError::MissingUser {
                    user_id: 99,
                    ..
                },
                ..
            }
        ));
        assert_eq!(
            error.to_string(),
            "first_desktop_session(device_type=2): failed to map row: session 1 references missing user 99"
        );
    }

    #[test]
    fn ended_before_cutoff_surfaces_unparseable_rows() {
        let (service, connection) = build_service("service-malformed");
        {
            let db = connection.lock().expect("lock should be available");
            let user_id = seed_user(&db, "Ada", "Lovelace", false);
            seed_session(&db, user_id, 1, "not a timestamp", Some("2024-01-01 00:00:00"));
        }

        let error = service
            .get_sessions_from_active_users_ended_before_cutoff()
            .expect_err("malformed row should fail");

        assert!(matches!(
            error,
            ServiceError::Mapping {
                operation: "sessions_from_active_users_ended_before_cutoff",
                source: MappingError::MalformedTimestamp {
                    column: "started_at_utc",
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn ended_before_cutoff_reports_unreadable_end_instead_of_dropping_it() {
        let (service, connection) = build_service("service-unreadable-end");
        {
            let db = connection.lock().expect("lock should be available");
            let user_id = seed_user(&db, "Ada", "Lovelace", false);
            seed_session(&db, user_id, 1, "2024-01-01 00:00:00", Some("garbage"));
            seed_session(
                &db,
                user_id,
                1,
                "2024-01-02 00:00:00",
                Some("2024-01-02 01:00:00"),
            );
        }

        let error = service
            .get_sessions_from_active_users_ended_before_cutoff()
            .expect_err("unreadable end should fail");

        assert!(matches!(
            error,
            ServiceError::Mapping {
                source: MappingError::MalformedTimestamp {
                    session_id: 1,
                    column: "ended_at_utc",
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn ended_before_cutoff_reports_orphaned_session_as_mapping_failure() {
        let (service, connection) = build_service("service-ended-before-orphan");
        {
            let db = connection.lock().expect("lock should be available");
            disable_foreign_keys(&db);
            seed_session(
                &db,
                404,
                1,
                "2024-01-01 00:00:00",
                Some("2024-01-01 01:00:00"),
            );
        }

        let error = service
            .get_sessions_from_active_users_ended_before_cutoff()
            .expect_err("orphaned session should fail");

        assert!(matches!(
            error,
            ServiceError::Mapping {
                operation: "sessions_from_active_users_ended_before_cutoff",
                source: MappingError::MissingUser {
                    session_id: 1,
                    user_id: 404,
                },
                ..
            }
        ));
    }

    #[test]
    fn ended_before_cutoff_lists_active_users_newest_first() {
        let (service, connection) = build_service("service-ended-before");
        let (older, newer) = {
            let db = connection.lock().expect("lock should be available");
            let active = seed_user(&db, "Ada", "Lovelace", false);
            let deleted = seed_user(&db, "Bob", "Gone", true);
            let older = seed_session(
                &db,
                active,
                1,
                "2024-01-01 08:00:00",
                Some("2024-01-01 09:00:00"),
            );
            let newer = seed_session(
                &db,
                active,
                2,
                "2024-06-01 08:00:00",
                Some("2024-06-01 09:00:00"),
            );
            seed_session(
                &db,
                deleted,
                2,
                "2024-07-01 08:00:00",
                Some("2024-07-01 09:00:00"),
            );
            seed_session(
                &db,
                active,
                2,
                "2025-02-01 08:00:00",
                Some("2025-02-01 09:00:00"),
            );
            (older, newer)
        };

        let sessions = service
            .get_sessions_from_active_users_ended_before_cutoff()
            .expect("listing should succeed");

        assert_eq!(
            sessions.iter().map(|session| session.id).collect::<Vec<_>>(),
            vec![newer, older]
        );
        assert!(
            sessions
                .iter()
                .all(|session| session.user_full_name == "Ada Lovelace")
        );
    }

    #[test]
    fn user_with_most_sessions_maps_user_fields() {
        let (service, connection) = build_service("service-most-sessions");
        let heavy = {
            let db = connection.lock().expect("lock should be available");
            let light = seed_user(&db, "Ada", "Lovelace", false);
            let heavy = seed_user(&db, "Grace", "Hopper", false);
            seed_session(&db, light, 1, "2024-01-01 00:00:00", None);
            seed_session(&db, heavy, 1, "2024-01-02 00:00:00", None);
            seed_session(&db, heavy, 2, "2024-01-03 00:00:00", None);
            heavy
        };

        let user = service
            .get_user_with_most_sessions()
            .expect("user should be found");

        assert_eq!(user.id, heavy);
        assert_eq!(user.first_name, "Grace");
        assert_eq!(user.last_name, "Hopper");
        assert!(!user.deleted);
    }

    #[test]
    fn users_with_mobile_session_uses_mobile_code() {
        let (service, connection) = build_service("service-mobile-users");
        let mobile_user = {
            let db = connection.lock().expect("lock should be available");
            let mobile_user = seed_user(&db, "Ada", "Lovelace", false);
            let desktop_user = seed_user(&db, "Grace", "Hopper", false);
            seed_session(&db, mobile_user, 1, "2024-01-01 00:00:00", None);
            seed_session(&db, mobile_user, 1, "2024-02-01 00:00:00", None);
            seed_session(&db, desktop_user, 2, "2024-03-01 00:00:00", None);
            mobile_user
        };

        let users = service
            .get_users_with_at_least_one_mobile_session()
            .expect("listing should succeed");

        assert_eq!(
            users.iter().map(|user| user.id).collect::<Vec<_>>(),
            vec![mobile_user]
        );
    }
}

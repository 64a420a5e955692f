use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::db::{open_connection, run_migrations, schema_version};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::services::SqliteAnalyticsService;

/// Opens and migrates the database, then wires the analytics service into API state.
pub fn build_state(db_path: &str) -> Result<ApiState, AppError> {
    let mut connection = open_connection(db_path).map_err(AppError::database_init)?;
    run_migrations(&mut connection).map_err(AppError::database_init)?;

    let version = schema_version(&connection).map_err(AppError::database_init)?;
    tracing::info!(db_path, schema_version = version, "database ready");

    let shared_connection = Arc::new(Mutex::new(connection));
    Ok(ApiState {
        analytics: Arc::new(SqliteAnalyticsService::new(shared_connection)),
    })
}

fn build_cors(allowed_origin: Option<&str>) -> Cors {
    let cors = Cors::default().allowed_methods(vec!["GET"]).max_age(3600);
    match allowed_origin {
        Some(origin) => cors.allowed_origin(origin),
        None => cors.allow_any_origin(),
    }
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    if let Some(parent) = std::path::Path::new(&config.db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(AppError::database_init)?;
    }

    let api_state = build_state(&config.db_path)?;

    tracing::info!(bind = %config.http_bind, "http server starting");

    let cors_allowed_origin = config.cors_allowed_origin.clone();
    actix_web::rt::System::new()
        .block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .wrap(build_cors(cors_allowed_origin.as_deref()))
                    .wrap(Logger::default())
                    .app_data(web::Data::new(api_state.clone()))
                    .configure(configure_routes)
            })
            .workers(config.http_workers)
            .bind(&config.http_bind)?
            .run()
            .await
        })
        .map_err(AppError::runtime)
}

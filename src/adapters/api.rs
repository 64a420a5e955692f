use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;

use crate::app::services::{AnalyticsQueryHandler, ServiceError};

#[derive(Clone)]
pub struct ApiState {
    pub analytics: Arc<dyn AnalyticsQueryHandler + Send + Sync>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(
        web::scope("/api/v1")
            .service(first_desktop_session_endpoint)
            .service(sessions_ended_before_cutoff_endpoint)
            .service(user_with_most_sessions_endpoint)
            .service(users_with_mobile_session_endpoint),
    );
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/sessions/first-desktop")]
async fn first_desktop_session_endpoint(state: web::Data<ApiState>) -> impl Responder {
    json_or_error(state.analytics.get_first_desktop_session())
}

#[get("/sessions/ended-before-cutoff")]
async fn sessions_ended_before_cutoff_endpoint(state: web::Data<ApiState>) -> impl Responder {
    json_or_error(
        state
            .analytics
            .get_sessions_from_active_users_ended_before_cutoff(),
    )
}

#[get("/users/most-sessions")]
async fn user_with_most_sessions_endpoint(state: web::Data<ApiState>) -> impl Responder {
    json_or_error(state.analytics.get_user_with_most_sessions())
}

#[get("/users/with-mobile-session")]
async fn users_with_mobile_session_endpoint(state: web::Data<ApiState>) -> impl Responder {
    json_or_error(state.analytics.get_users_with_at_least_one_mobile_session())
}

fn json_or_error<T: Serialize>(result: Result<T, ServiceError>) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(error) => service_error_response(error),
    }
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    match &error {
        ServiceError::NotFound { operation } => {
            tracing::info!(operation = *operation, "query returned no result");
            HttpResponse::NotFound().json(serde_json::json!({
                "error": error.to_string()
            }))
        }
        ServiceError::Mapping { .. }
        | ServiceError::Database { .. }
        | ServiceError::DbLockPoisoned { .. } => {
            tracing::error!(error = %error, "analytics query failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": error.to_string()
            }))
        }
    }
}

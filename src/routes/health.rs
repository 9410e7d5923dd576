use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

/// Health check endpoint
///
/// Reports the hosting environment and which database backend was selected at startup.
#[get("/health")]
pub async fn health(app: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "environment": app.environment.to_string(),
        "database": app.backend.to_string(),
        "timestamp": Utc::now()
    }))
}

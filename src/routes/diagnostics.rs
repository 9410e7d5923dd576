use actix_web::{
    dev::ServiceResponse,
    get,
    middleware::ErrorHandlerResponse,
    post, web, HttpResponse, Responder,
};
use log::{error, info};
use serde_json::json;

use crate::{auth::ADMIN_ROLE, error::AppError, state::AppState};

pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing your request.";
/// Strict-Transport-Security value sent outside Development (30 days).
pub const HSTS_HEADER_VALUE: &str = "max-age=2592000";

/// Applies the identity schema to the selected database. Development only.
#[post("/ApplyDatabaseMigrations")]
pub async fn apply_migrations(app: web::Data<AppState>) -> Result<impl Responder, AppError> {
    app.identity.store().migrate().await?;
    app.identity.ensure_role(ADMIN_ROLE).await?;
    info!("Applied identity schema to the {} database", app.backend);
    Ok(HttpResponse::NoContent().finish())
}

#[get("/Error")]
pub async fn error_page() -> impl Responder {
    HttpResponse::Ok().json(json!({ "error": GENERIC_ERROR_MESSAGE }))
}

/// Production handler for 500 responses: the original body is logged and replaced.
pub fn generic_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    error!(
        "Unhandled error for {} {}: {}",
        res.request().method(),
        res.request().path(),
        res.status()
    );
    let (req, _) = res.into_parts();
    let response =
        HttpResponse::InternalServerError().json(json!({ "error": GENERIC_ERROR_MESSAGE }));
    let res = ServiceResponse::new(req, response).map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}

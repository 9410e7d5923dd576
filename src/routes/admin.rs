use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{auth::RequireAdministrator, error::AppError, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToRoleRequest {
    #[validate(length(min = 1, max = 256))]
    pub role: String,
}

#[get("/Roles")]
pub async fn list_roles(
    app: web::Data<AppState>,
    _admin: RequireAdministrator,
) -> Result<impl Responder, AppError> {
    let roles = app.identity.list_roles().await?;
    Ok(HttpResponse::Ok().json(roles))
}

#[post("/Roles")]
pub async fn create_role(
    app: web::Data<AppState>,
    _admin: RequireAdministrator,
    body: web::Json<CreateRoleRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let role = app.identity.create_role(&body.name).await?;
    Ok(HttpResponse::Created().json(role))
}

#[get("/Users/{id}")]
pub async fn get_user(
    app: web::Data<AppState>,
    _admin: RequireAdministrator,
    path: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let profile = app.identity.profile(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Adds a user to a role. The change shows up in the user's cookie the next time
/// it is issued or revalidated.
#[post("/Users/{id}/Roles")]
pub async fn add_user_to_role(
    app: web::Data<AppState>,
    RequireAdministrator(admin): RequireAdministrator,
    path: web::Path<String>,
    body: web::Json<AddToRoleRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let user_id = path.into_inner();

    app.identity.add_to_role(&user_id, &body.role).await?;
    log::info!("{} added user {} to role {}", admin.email, user_id, body.role);

    let roles = app.identity.roles_for(&user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user_id": user_id, "roles": roles })))
}

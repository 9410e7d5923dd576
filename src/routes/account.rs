use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::{
    auth::{CurrentUser, Principal, APPLICATION_SCHEME},
    error::AppError,
    identity::{manager::confirmation_link, SignInResult},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub email: String,
    pub requires_confirmation: bool,
    /// Only present when outgoing email is not actually delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_link: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmEmailQuery {
    pub user_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}

/// Register a new account
///
/// The account starts unconfirmed and cannot sign in until the emailed link is followed.
#[post("/Register")]
pub async fn register(
    app: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;

    let registration = app.identity.register(&body.email, &body.password).await?;
    let user = registration.user;

    let link = (!app.identity.email_sender().delivers())
        .then(|| confirmation_link(&user.id, &registration.confirmation_code));

    Ok(HttpResponse::Created().json(RegisterResponse {
        user_id: user.id,
        email: user.email,
        requires_confirmation: app.identity.options().sign_in.require_confirmed_account,
        confirmation_link: link,
    }))
}

#[get("/ConfirmEmail")]
pub async fn confirm_email(
    app: web::Data<AppState>,
    query: web::Query<ConfirmEmailQuery>,
) -> Result<impl Responder, AppError> {
    app.identity
        .confirm_email(&query.user_id, &query.code)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) | AppError::BadRequest(_) => {
                AppError::BadRequest("Error confirming your email.".into())
            }
            other => other,
        })?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Thank you for confirming your email." })))
}

/// Always answers 200 so the endpoint cannot be used to discover which accounts exist.
#[post("/ResendEmailConfirmation")]
pub async fn resend_email_confirmation(
    app: web::Data<AppState>,
    body: web::Json<EmailRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;

    let mut response = json!({
        "message": "Verification email sent. Please check your email."
    });
    if let Some(resent) = app.identity.resend_confirmation(&body.email).await? {
        if !app.identity.email_sender().delivers() {
            response["confirmation_link"] =
                json!(confirmation_link(&resent.user.id, &resent.confirmation_code));
        }
    }

    Ok(HttpResponse::Ok().json(response))
}

/// Sign in with email and password
///
/// Sets the application cookie on success. `remember_me` makes the cookie persistent.
#[post("/Login")]
pub async fn login(
    app: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;

    match app
        .identity
        .password_sign_in(&body.email, &body.password)
        .await?
    {
        SignInResult::Succeeded(principal) => {
            let cookie = app
                .cookies
                .sign_in(APPLICATION_SCHEME, &principal, body.remember_me)?;
            Ok(HttpResponse::Ok().cookie(cookie).json(json!({
                "user_id": principal.user_id,
                "email": principal.email,
                "roles": principal.roles,
            })))
        }
        SignInResult::NotAllowed => Err(AppError::Forbidden(
            "You must confirm your email before signing in.".into(),
        )),
        SignInResult::Failed => Err(AppError::Unauthorized("Invalid login attempt.".into())),
    }
}

#[post("/Logout")]
pub async fn logout(app: web::Data<AppState>) -> impl Responder {
    let mut response = HttpResponse::Ok();
    for cookie in app.cookies.sign_out() {
        response.cookie(cookie);
    }
    response.json(json!({ "message": "You have been logged out." }))
}

/// Starts a password reset. The answer is the same whether or not the account
/// exists. The reset code is echoed back only in Development when email is not
/// delivered.
#[post("/ForgotPassword")]
pub async fn forgot_password(
    app: web::Data<AppState>,
    body: web::Json<EmailRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;

    let mut response = json!({
        "message": "Please check your email to reset your password."
    });
    if let Some(code) = app.identity.forgot_password(&body.email).await? {
        if app.environment.is_development() && !app.identity.email_sender().delivers() {
            response["reset_code"] = json!(code);
        }
    }

    Ok(HttpResponse::Ok().json(response))
}

#[post("/ResetPassword")]
pub async fn reset_password(
    app: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;

    app.identity
        .reset_password(&body.email, &body.code, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Your password has been reset." })))
}

#[get("/Manage")]
pub async fn manage(
    app: web::Data<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<impl Responder, AppError> {
    let profile = app.identity.profile(&principal.user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Changes the password and re-issues the cookie, since the old one carries the
/// previous security stamp.
#[post("/Manage/ChangePassword")]
pub async fn change_password(
    app: web::Data<AppState>,
    CurrentUser(principal): CurrentUser,
    body: web::Json<ChangePasswordRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;

    app.identity
        .change_password(&principal.user_id, &body.old_password, &body.new_password)
        .await?;

    let user = app
        .identity
        .find_by_id(&principal.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let roles = app.identity.roles_for(&user.id).await?;
    let cookie = app
        .cookies
        .sign_in(APPLICATION_SCHEME, &Principal::new(&user, roles), false)?;

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "message": "Your password has been changed." })))
}

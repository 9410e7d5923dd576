use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use super::{AuthenticationState, Principal, REQUIRE_ADMINISTRATOR_ROLE};
use crate::error::AppError;
use crate::state::AppState;

fn authentication_state(req: &HttpRequest) -> AuthenticationState {
    req.extensions()
        .get::<AuthenticationState>()
        .cloned()
        .unwrap_or_default()
}

/// The signed-in user. Rejects anonymous requests with 401.
///
/// Relies on `AuthenticationStateMiddleware` having run; without it every
/// request looks anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl FromRequest for CurrentUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match authentication_state(req) {
            AuthenticationState::Authenticated(principal) => ready(Ok(CurrentUser(principal))),
            AuthenticationState::Anonymous => {
                let err = AppError::Unauthorized("Authentication required".to_string());
                ready(Err(err.into()))
            }
        }
    }
}

/// A principal that satisfies the `RequireAdministratorRole` policy.
#[derive(Debug, Clone)]
pub struct RequireAdministrator(pub Principal);

impl FromRequest for RequireAdministrator {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = authentication_state(req);
        let result = match req.app_data::<web::Data<AppState>>() {
            Some(app) => app
                .authorization
                .authorize(REQUIRE_ADMINISTRATOR_ROLE, &state)
                .map(|principal| RequireAdministrator(principal.clone())),
            None => Err(AppError::InternalServerError(
                "Application state is not registered".into(),
            )),
        };
        ready(result.map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;

    fn principal() -> Principal {
        Principal {
            user_id: "123".into(),
            email: "lee@example.com".into(),
            roles: vec![],
            security_stamp: "S".into(),
        }
    }

    #[actix_rt::test]
    async fn test_current_user_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut()
            .insert(AuthenticationState::Authenticated(principal()));

        let mut payload = Payload::None;
        let extracted = CurrentUser::from_request(&req, &mut payload).await;
        assert_eq!(extracted.unwrap().0.user_id, "123");
    }

    #[actix_rt::test]
    async fn test_current_user_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let err = CurrentUser::from_request(&req, &mut payload)
            .await
            .unwrap_err();
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);
    }
}

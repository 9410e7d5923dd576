use std::rc::Rc;

use actix_web::{
    cookie::Cookie,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::{debug, info, warn};

use super::AuthenticationState;
use crate::state::AppState;

/// Resolves the caller from the default-scheme cookie and stores the result as an
/// [`AuthenticationState`] in request extensions. Never rejects a request; routes
/// decide what anonymous callers may do.
pub struct AuthenticationStateMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthenticationStateMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthenticationStateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationStateService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthenticationStateService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationStateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let app = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let (state, refreshed) = match &app {
                Some(app) => {
                    let cookie = req
                        .cookie(app.cookies.options().default_scheme)
                        .map(|c| c.value().to_string());
                    resolve(app, cookie).await
                }
                None => (AuthenticationState::Anonymous, None),
            };

            req.extensions_mut().insert(state);
            let mut res = service.call(req).await?;

            // A cookie written by the handler (sign-in, sign-out) wins over the refresh.
            if let Some(cookie) = refreshed {
                let written = res
                    .response()
                    .cookies()
                    .any(|c| c.name() == cookie.name());
                if !written {
                    if let Err(e) = res.response_mut().add_cookie(&cookie) {
                        warn!("Could not refresh {} cookie: {}", cookie.name(), e);
                    }
                }
            }
            Ok(res)
        })
    }
}

/// Resolves the cookie into an authentication state. A ticket that passed
/// revalidation also yields a re-issued cookie with a fresh issue time.
async fn resolve(
    app: &AppState,
    cookie: Option<String>,
) -> (AuthenticationState, Option<Cookie<'static>>) {
    let Some(value) = cookie else {
        return (AuthenticationState::Anonymous, None);
    };

    let scheme = app.cookies.options().default_scheme;
    let mut ticket = match app.cookies.authenticate(scheme, &value) {
        Ok(ticket) => ticket,
        Err(e) => {
            debug!("Ignoring {} cookie: {}", scheme, e);
            return (AuthenticationState::Anonymous, None);
        }
    };

    if !app.cookies.needs_revalidation(&ticket) {
        return (AuthenticationState::Authenticated(ticket.principal), None);
    }

    let user_id = ticket.principal.user_id.clone();
    match app.identity.find_by_id(&user_id).await {
        Ok(Some(user)) if user.security_stamp == ticket.principal.security_stamp => {
            match app.identity.roles_for(&user.id).await {
                Ok(roles) => ticket.principal.roles = roles,
                Err(e) => warn!("Keeping cookie roles for user {}: {}", user.id, e),
            }
            let refreshed = match app.cookies.refresh(scheme, &ticket) {
                Ok(cookie) => Some(cookie),
                Err(e) => {
                    warn!("Could not re-issue {} cookie for user {}: {}", scheme, user.id, e);
                    None
                }
            };
            (AuthenticationState::Authenticated(ticket.principal), refreshed)
        }
        Ok(_) => {
            info!(
                "Security stamp for user {} no longer matches, treating as signed out",
                user_id
            );
            (AuthenticationState::Anonymous, None)
        }
        Err(e) => {
            warn!("Could not revalidate user {}: {}", user_id, e);
            (AuthenticationState::Anonymous, None)
        }
    }
}

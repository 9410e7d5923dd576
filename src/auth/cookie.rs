use actix_web::cookie::{time, Cookie, SameSite};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthenticationOptions, Principal, APPLICATION_SCHEME, EXTERNAL_SCHEME};
use crate::error::AppError;
use crate::identity::TokenKeys;

#[derive(Debug, Serialize, Deserialize)]
struct TicketClaims {
    sub: String,
    email: String,
    roles: Vec<String>,
    stamp: String,
    /// Scheme the cookie was issued for; a cookie is only valid under its own name.
    scheme: String,
    #[serde(default)]
    persistent: bool,
    iat: i64,
    exp: i64,
}

/// A successfully decoded authentication cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationTicket {
    pub principal: Principal,
    pub issued_at: DateTime<Utc>,
    pub persistent: bool,
}

/// Issues, reads and clears the identity cookies.
#[derive(Clone)]
pub struct CookieAuthenticator {
    keys: TokenKeys,
    options: AuthenticationOptions,
}

impl CookieAuthenticator {
    pub fn new(keys: TokenKeys, options: AuthenticationOptions) -> Self {
        Self { keys, options }
    }

    pub fn options(&self) -> &AuthenticationOptions {
        &self.options
    }

    /// Builds the cookie for `scheme`. Persistent cookies outlive the browser
    /// session; the signed ticket expires after `expire_time` either way.
    pub fn sign_in(
        &self,
        scheme: &str,
        principal: &Principal,
        persistent: bool,
    ) -> Result<Cookie<'static>, AppError> {
        let now = Utc::now();
        let claims = TicketClaims {
            sub: principal.user_id.clone(),
            email: principal.email.clone(),
            roles: principal.roles.clone(),
            stamp: principal.security_stamp.clone(),
            scheme: scheme.to_string(),
            persistent,
            iat: now.timestamp(),
            exp: (now + self.options.expire_time).timestamp(),
        };
        let token = self.keys.sign(&claims)?;

        let mut cookie = Cookie::build(scheme.to_string(), token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.options.secure_cookies)
            .finish();
        if persistent {
            cookie.set_max_age(time::Duration::seconds(
                self.options.expire_time.num_seconds(),
            ));
        }
        Ok(cookie)
    }

    /// Removal cookies for every identity scheme.
    pub fn sign_out(&self) -> Vec<Cookie<'static>> {
        [APPLICATION_SCHEME, EXTERNAL_SCHEME]
            .into_iter()
            .map(|scheme| {
                let mut cookie = Cookie::build(scheme, "").path("/").finish();
                cookie.make_removal();
                cookie
            })
            .collect()
    }

    pub fn authenticate(&self, scheme: &str, value: &str) -> Result<AuthenticationTicket, AppError> {
        let claims: TicketClaims = self.keys.verify(value)?;
        if claims.scheme != scheme {
            return Err(AppError::Unauthorized(format!(
                "Cookie was issued for scheme {}",
                claims.scheme
            )));
        }

        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or_else(|| AppError::Unauthorized("Invalid issue time".into()))?;

        Ok(AuthenticationTicket {
            principal: Principal {
                user_id: claims.sub,
                email: claims.email,
                roles: claims.roles,
                security_stamp: claims.stamp,
            },
            issued_at,
            persistent: claims.persistent,
        })
    }

    /// Re-issues a revalidated ticket under `scheme` with a fresh issue time,
    /// keeping its persistence.
    pub fn refresh(
        &self,
        scheme: &str,
        ticket: &AuthenticationTicket,
    ) -> Result<Cookie<'static>, AppError> {
        self.sign_in(scheme, &ticket.principal, ticket.persistent)
    }

    pub fn needs_revalidation(&self, ticket: &AuthenticationTicket) -> bool {
        Utc::now() - ticket.issued_at >= self.options.revalidation_interval
    }
}

pub mod cookie;
pub mod extractors;
pub mod middleware;
pub mod policy;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::models::ApplicationUser;

pub use cookie::{AuthenticationTicket, CookieAuthenticator};
pub use extractors::{CurrentUser, RequireAdministrator};
pub use middleware::AuthenticationStateMiddleware;
pub use policy::{AuthorizationOptions, AuthorizationPolicy, ADMIN_ROLE, REQUIRE_ADMINISTRATOR_ROLE};

/// Cookie written by password sign-in and read on every request.
pub const APPLICATION_SCHEME: &str = "Identity.Application";
/// Cookie used for sign-ins that arrive from an external provider.
pub const EXTERNAL_SCHEME: &str = "Identity.External";

/// Cookie authentication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationOptions {
    /// Scheme requests are authenticated with.
    pub default_scheme: &'static str,
    /// Scheme sign-ins go to unless the caller names one.
    pub default_sign_in_scheme: &'static str,
    pub expire_time: Duration,
    /// Cookies older than this are checked against the stored security stamp.
    pub revalidation_interval: Duration,
    pub secure_cookies: bool,
}

impl Default for AuthenticationOptions {
    fn default() -> Self {
        Self {
            default_scheme: APPLICATION_SCHEME,
            default_sign_in_scheme: EXTERNAL_SCHEME,
            expire_time: Duration::days(14),
            revalidation_interval: Duration::minutes(30),
            secure_cookies: true,
        }
    }
}

/// The signed-in user as carried by the authentication cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub security_stamp: String,
}

impl Principal {
    pub fn new(user: &ApplicationUser, roles: Vec<String>) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            roles,
            security_stamp: user.security_stamp.clone(),
        }
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Per-request authentication result, stored in request extensions by
/// [`AuthenticationStateMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthenticationState {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

impl AuthenticationState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthenticationState::Authenticated(principal) => Some(principal),
            AuthenticationState::Anonymous => None,
        }
    }
}

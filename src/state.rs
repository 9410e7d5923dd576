use crate::auth::{AuthorizationOptions, CookieAuthenticator};
use crate::config::Environment;
use crate::data::BackendKind;
use crate::identity::IdentityService;

/// Services shared by every request, registered once as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub cookies: CookieAuthenticator,
    pub authorization: AuthorizationOptions,
    pub environment: Environment,
    pub backend: BackendKind,
}

//! Process startup: configuration → backend selection → service registration →
//! middleware pipeline → routes → HTTP listener.
//!
//! [`StartupPlan::configure`] is the side-effect-free part and decides everything
//! that can be decided from configuration and the host platform. [`run`] connects
//! to the chosen database and serves until shutdown.

use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::{header, StatusCode},
    middleware::{Condition, DefaultHeaders, ErrorHandlers, Logger},
    web, App, HttpServer,
};
use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{
    AuthenticationOptions, AuthenticationStateMiddleware, AuthorizationOptions,
    AuthorizationPolicy, CookieAuthenticator, ADMIN_ROLE, REQUIRE_ADMINISTRATOR_ROLE,
};
use crate::config::{Config, ConfigError, Environment};
use crate::data::{self, select_backend, BackendKind, DatabaseBackend, DynIdentityStore};
use crate::error::AppError;
use crate::identity::{IdentityOptions, IdentityService, NoOpEmailSender, TokenKeys};
use crate::platform::Platform;
use crate::routes::{self, diagnostics};
use crate::state::AppState;

/// Fatal startup failures. Any of these ends the process with a non-zero status.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to connect to the {kind} database ({name}): {source}")]
    Database {
        kind: BackendKind,
        name: &'static str,
        source: sqlx::Error,
    },

    #[error("Failed to apply the identity schema: {0}")]
    Migration(AppError),

    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Services registered at startup, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRegistration {
    /// Application endpoints, mapped when the app is built.
    Components,
    AuthenticationState,
    CookieAuthentication,
    Database(BackendKind),
    IdentityCore,
    Authorization,
    EmailSender,
}

/// Everything decided before the process touches the network.
pub struct StartupPlan {
    pub environment: Environment,
    pub platform: Platform,
    pub backend: DatabaseBackend,
    pub identity: IdentityOptions,
    pub authentication: AuthenticationOptions,
    pub authorization: AuthorizationOptions,
    pub registrations: Vec<ServiceRegistration>,
    pub server_host: String,
    pub server_port: u16,
    pub auto_migrate: bool,
    signing_key: String,
}

impl StartupPlan {
    /// Reads configuration through `lookup` and configures for `platform`.
    /// A missing connection string fails here, before anything is registered.
    pub fn from_lookup<F>(lookup: F, platform: Platform) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config::from_lookup(lookup)?;
        Ok(Self::configure(config, platform))
    }

    pub fn configure(config: Config, platform: Platform) -> Self {
        let environment = config.environment;
        let mut registrations = Vec::new();

        registrations.push(ServiceRegistration::Components);
        registrations.push(ServiceRegistration::AuthenticationState);

        let authentication = AuthenticationOptions {
            secure_cookies: !environment.is_development(),
            ..AuthenticationOptions::default()
        };
        registrations.push(ServiceRegistration::CookieAuthentication);

        let backend = select_backend(&platform, &config.connection_strings);
        info!(
            "Platform {} selected the {} database using connection string '{}'",
            platform, backend.kind, backend.connection_name
        );
        registrations.push(ServiceRegistration::Database(backend.kind));

        let identity = IdentityOptions::default();
        registrations.push(ServiceRegistration::IdentityCore);

        let mut authorization = AuthorizationOptions::default();
        authorization.add_policy(AuthorizationPolicy::require_role(
            REQUIRE_ADMINISTRATOR_ROLE,
            &[ADMIN_ROLE],
        ));
        registrations.push(ServiceRegistration::Authorization);

        registrations.push(ServiceRegistration::EmailSender);

        let signing_key = config.jwt_secret.unwrap_or_else(|| {
            warn!("JWT_SECRET is not set; cookies and account codes will not survive a restart");
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        });

        for registration in &registrations {
            info!("Registered {:?}", registration);
        }

        Self {
            environment,
            platform,
            backend,
            identity,
            authentication,
            authorization,
            registrations,
            server_host: config.server_host,
            server_port: config.server_port,
            auto_migrate: config.auto_migrate,
            signing_key,
        }
    }

    /// Wires the registered services to an opened store.
    pub fn build_state(&self, store: DynIdentityStore) -> AppState {
        let keys = TokenKeys::from_secret(self.signing_key.as_bytes());
        let backend = store.kind();

        AppState {
            identity: IdentityService::new(
                store,
                self.identity.clone(),
                keys.clone(),
                Arc::new(NoOpEmailSender),
            ),
            cookies: CookieAuthenticator::new(keys, self.authentication.clone()),
            authorization: self.authorization.clone(),
            environment: self.environment,
            backend,
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

/// Builds the application with its environment-specific middleware pipeline.
///
/// Development maps the migrations endpoint and lets error details through.
/// Other environments replace 500 bodies with a generic message and send
/// `Strict-Transport-Security`.
pub fn build_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let development = state.environment.is_development();

    App::new()
        .app_data(state)
        .wrap(AuthenticationStateMiddleware)
        .wrap(Condition::new(
            !development,
            ErrorHandlers::new().handler(
                StatusCode::INTERNAL_SERVER_ERROR,
                diagnostics::generic_error,
            ),
        ))
        // Outside the error handler so rewritten 500s keep the header.
        .wrap(Condition::new(
            !development,
            DefaultHeaders::new().add((
                header::STRICT_TRANSPORT_SECURITY,
                diagnostics::HSTS_HEADER_VALUE,
            )),
        ))
        .wrap(Logger::default())
        .configure(routes::config)
        .configure(move |cfg| {
            if development {
                routes::development(cfg);
            }
        })
}

/// Reads the process environment and runs the service on the current platform.
pub async fn launch() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    run(StartupPlan::configure(config, Platform::current())).await
}

pub async fn run(plan: StartupPlan) -> Result<(), StartupError> {
    let store = data::connect(&plan.backend)
        .await
        .map_err(|source| StartupError::Database {
            kind: plan.backend.kind,
            name: plan.backend.connection_name,
            source,
        })?;

    if plan.auto_migrate {
        store.migrate().await.map_err(StartupError::Migration)?;
    }

    let state = web::Data::new(plan.build_state(store));
    if plan.auto_migrate {
        state
            .identity
            .ensure_role(ADMIN_ROLE)
            .await
            .map_err(StartupError::Migration)?;
    }

    info!(
        "Starting server at {} ({} environment)",
        plan.server_url(),
        plan.environment
    );
    HttpServer::new(move || build_app(state.clone()))
        .bind((plan.server_host.as_str(), plan.server_port))?
        .run()
        .await?;

    Ok(())
}

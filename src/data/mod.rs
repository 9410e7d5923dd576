//! Persistence for accounts and roles.
//!
//! Two backends sit behind [`IdentityStore`]: PostgreSQL as the full relational
//! database and SQLite as the embedded one. Which one a process uses is decided
//! once at startup by [`select_backend`] from the host platform.

pub mod postgres;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ConnectionStrings, DEFAULT_CONNECTION, MOCK_DB_CONNECTION};
use crate::error::AppError;
use crate::models::{ApplicationUser, NewUser, Role};
use crate::platform::Platform;

pub use postgres::PgIdentityStore;
pub use sqlite::SqliteIdentityStore;

/// Storage operations the identity layer needs. Lookups take normalized keys.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Creates the identity tables if they do not exist yet.
    async fn migrate(&self) -> Result<(), AppError>;

    async fn create_user(&self, user: &NewUser) -> Result<ApplicationUser, AppError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<ApplicationUser>, AppError>;
    async fn find_user_by_email(
        &self,
        normalized_email: &str,
    ) -> Result<Option<ApplicationUser>, AppError>;
    async fn confirm_email(&self, id: &str) -> Result<(), AppError>;
    async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
        security_stamp: &str,
    ) -> Result<(), AppError>;

    async fn create_role(&self, role: &Role) -> Result<(), AppError>;
    async fn find_role(&self, normalized_name: &str) -> Result<Option<Role>, AppError>;
    async fn list_roles(&self) -> Result<Vec<Role>, AppError>;
    /// Adding a membership that already exists is a no-op.
    async fn add_user_to_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError>;
    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<String>, AppError>;
}

/// Shared handle to whichever backend was selected.
pub type DynIdentityStore = Arc<dyn IdentityStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Full relational database (PostgreSQL).
    Relational,
    /// Embedded database (SQLite).
    Embedded,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BackendKind::Relational => f.write_str("postgres"),
            BackendKind::Embedded => f.write_str("sqlite"),
        }
    }
}

/// The chosen backend together with the connection string it will use.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseBackend {
    pub kind: BackendKind,
    /// Name of the configuration entry the connection string came from.
    pub connection_name: &'static str,
    pub connection_string: String,
}

// Connection strings may carry credentials.
impl fmt::Debug for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBackend")
            .field("kind", &self.kind)
            .field("connection_name", &self.connection_name)
            .finish_non_exhaustive()
    }
}

/// Windows uses the full database, Linux the embedded one, everything else
/// falls back to the full database.
pub fn select_backend(platform: &Platform, connections: &ConnectionStrings) -> DatabaseBackend {
    match platform {
        Platform::Linux => DatabaseBackend {
            kind: BackendKind::Embedded,
            connection_name: MOCK_DB_CONNECTION,
            connection_string: connections.mock_db_connection.clone(),
        },
        Platform::Windows | Platform::Other(_) => DatabaseBackend {
            kind: BackendKind::Relational,
            connection_name: DEFAULT_CONNECTION,
            connection_string: connections.default_connection.clone(),
        },
    }
}

/// Opens a pool for the selected backend.
pub async fn connect(backend: &DatabaseBackend) -> Result<DynIdentityStore, sqlx::Error> {
    let store: DynIdentityStore = match backend.kind {
        BackendKind::Relational => {
            Arc::new(PgIdentityStore::connect(&backend.connection_string).await?)
        }
        BackendKind::Embedded => {
            Arc::new(SqliteIdentityStore::connect(&backend.connection_string).await?)
        }
    };
    Ok(store)
}

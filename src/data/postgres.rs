use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{BackendKind, IdentityStore};
use crate::error::AppError;
use crate::models::{ApplicationUser, NewUser, Role};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        user_name TEXT NOT NULL,
        normalized_user_name TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        normalized_email TEXT NOT NULL UNIQUE,
        email_confirmed BOOLEAN NOT NULL DEFAULT FALSE,
        password_hash TEXT NOT NULL,
        security_stamp TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS roles (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        normalized_name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS user_roles (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )",
];

const USER_COLUMNS: &str = "id, user_name, normalized_user_name, email, normalized_email, \
     email_confirmed, password_hash, security_stamp, created_at";

/// Identity store on the full relational database.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn migrate(&self) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn create_user(&self, user: &NewUser) -> Result<ApplicationUser, AppError> {
        sqlx::query(
            "INSERT INTO users (id, user_name, normalized_user_name, email, normalized_email, \
             email_confirmed, password_hash, security_stamp, created_at) \
             VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7, $8)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.normalized_email)
        .bind(&user.email)
        .bind(&user.normalized_email)
        .bind(&user.password_hash)
        .bind(&user.security_stamp)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        self.find_user_by_id(&user.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Inserted user vanished".into()))
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<ApplicationUser>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, ApplicationUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(
        &self,
        normalized_email: &str,
    ) -> Result<Option<ApplicationUser>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE normalized_email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, ApplicationUser>(&sql)
            .bind(normalized_email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn confirm_email(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET email_confirmed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn update_password(
        &self,
        id: &str,
        password_hash: &str,
        security_stamp: &str,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, security_stamp = $2 WHERE id = $3")
                .bind(password_hash)
                .bind(security_stamp)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        Ok(())
    }

    async fn create_role(&self, role: &Role) -> Result<(), AppError> {
        sqlx::query("INSERT INTO roles (id, name, normalized_name) VALUES ($1, $2, $3)")
            .bind(&role.id)
            .bind(&role.name)
            .bind(&role.normalized_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_role(&self, normalized_name: &str) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, normalized_name FROM roles WHERE normalized_name = $1",
        )
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let roles =
            sqlx::query_as::<_, Role>("SELECT id, name, normalized_name FROM roles ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(roles)
    }

    async fn add_user_to_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let roles = sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = $1 ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }
}

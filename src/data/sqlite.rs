use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

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
        email_confirmed BOOLEAN NOT NULL DEFAULT 0,
        password_hash TEXT NOT NULL,
        security_stamp TEXT NOT NULL,
        created_at DATETIME NOT NULL
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

/// Identity store on the embedded database.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    /// Opens the database, creating the file if needed. An in-memory database
    /// only lives as long as its connection, so its pool is held to a single
    /// connection that is never recycled.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Ok(Self { pool })
    }

    /// A fresh in-memory store with the schema already applied.
    pub async fn in_memory() -> Result<Self, AppError> {
        let store = Self::connect("sqlite::memory:").await?;
        store.migrate().await?;
        Ok(store)
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
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
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)",
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
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
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
        let sql = format!("SELECT {} FROM users WHERE normalized_email = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, ApplicationUser>(&sql)
            .bind(normalized_email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn confirm_email(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET email_confirmed = 1 WHERE id = ?")
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
            sqlx::query("UPDATE users SET password_hash = ?, security_stamp = ? WHERE id = ?")
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
        sqlx::query("INSERT INTO roles (id, name, normalized_name) VALUES (?, ?, ?)")
            .bind(&role.id)
            .bind(&role.name)
            .bind(&role.normalized_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_role(&self, normalized_name: &str) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, normalized_name FROM roles WHERE normalized_name = ?",
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
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
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
             WHERE ur.user_id = ? ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::normalize;

    #[test]
    fn test_is_in_memory() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:app?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://app.db"));
    }

    #[actix_rt::test]
    async fn test_user_lifecycle() {
        let store = SqliteIdentityStore::in_memory().await.unwrap();
        assert_eq!(store.kind(), BackendKind::Embedded);

        let new_user = NewUser::new("bob@example.com", "hash".into());
        let user = store.create_user(&new_user).await.unwrap();
        assert_eq!(user.user_name, "bob@example.com");
        assert!(!user.email_confirmed);

        let found = store
            .find_user_by_email(&normalize("BOB@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);

        store.confirm_email(&user.id).await.unwrap();
        store
            .update_password(&user.id, "new-hash", "NEWSTAMP")
            .await
            .unwrap();

        let updated = store.find_user_by_id(&user.id).await.unwrap().unwrap();
        assert!(updated.email_confirmed);
        assert_eq!(updated.password_hash, "new-hash");
        assert_eq!(updated.security_stamp, "NEWSTAMP");
    }

    #[actix_rt::test]
    async fn test_duplicate_email_is_conflict() {
        let store = SqliteIdentityStore::in_memory().await.unwrap();
        store
            .create_user(&NewUser::new("dup@example.com", "hash".into()))
            .await
            .unwrap();

        let err = store
            .create_user(&NewUser::new("DUP@example.com", "hash".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_rt::test]
    async fn test_roles() {
        let store = SqliteIdentityStore::in_memory().await.unwrap();
        let user = store
            .create_user(&NewUser::new("carol@example.com", "hash".into()))
            .await
            .unwrap();

        let admin = Role::new("Admin");
        store.create_role(&admin).await.unwrap();
        store.create_role(&Role::new("Editor")).await.unwrap();

        store.add_user_to_role(&user.id, &admin.id).await.unwrap();
        store.add_user_to_role(&user.id, &admin.id).await.unwrap();

        assert_eq!(store.roles_for_user(&user.id).await.unwrap(), vec!["Admin"]);
        let names: Vec<String> = store
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Admin", "Editor"]);
        assert_eq!(store.find_role("ADMIN").await.unwrap(), Some(admin));
    }

    #[actix_rt::test]
    async fn test_confirm_unknown_user() {
        let store = SqliteIdentityStore::in_memory().await.unwrap();
        assert!(matches!(
            store.confirm_email("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An account as stored in the `users` table.
///
/// The user name is the email address. `security_stamp` changes whenever the
/// credentials change, which invalidates outstanding account tokens and cookies.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ApplicationUser {
    pub id: String,
    pub user_name: String,
    pub normalized_user_name: String,
    pub email: String,
    pub normalized_email: String,
    pub email_confirmed: bool,
    pub password_hash: String,
    pub security_stamp: String,
    pub created_at: DateTime<Utc>,
}

/// Values needed to insert a new account. Confirmation always starts out false.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub normalized_email: String,
    pub password_hash: String,
    pub security_stamp: String,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn new(email: &str, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            normalized_email: normalize(email),
            password_hash,
            security_stamp: new_security_stamp(),
            created_at: Utc::now(),
        }
    }
}

/// What the API is allowed to show about an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub email_confirmed: bool,
    pub roles: Vec<String>,
}

impl UserProfile {
    pub fn new(user: &ApplicationUser, roles: Vec<String>) -> Self {
        Self {
            id: user.id.clone(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            email_confirmed: user.email_confirmed,
            roles,
        }
    }
}

/// Lookup key for names and emails: trimmed and upper-cased.
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

pub fn new_security_stamp() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

use std::sync::Arc;

use log::{info, warn};

use super::email::EmailSender;
use super::password::{hash_password, verify_password};
use super::tokens::{TokenKeys, TokenPurpose};
use super::IdentityOptions;
use crate::auth::Principal;
use crate::data::DynIdentityStore;
use crate::error::AppError;
use crate::models::user::{new_security_stamp, normalize};
use crate::models::{ApplicationUser, NewUser, Role, UserProfile};

/// Outcome of a password sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInResult {
    Succeeded(Principal),
    /// Credentials were right but the account may not sign in yet (unconfirmed email).
    NotAllowed,
    Failed,
}

/// A freshly created account and the code that confirms it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: ApplicationUser,
    pub confirmation_code: String,
}

/// User and role management on top of the selected store.
#[derive(Clone)]
pub struct IdentityService {
    store: DynIdentityStore,
    options: IdentityOptions,
    keys: TokenKeys,
    email: Arc<dyn EmailSender>,
}

impl IdentityService {
    pub fn new(
        store: DynIdentityStore,
        options: IdentityOptions,
        keys: TokenKeys,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            store,
            options,
            keys,
            email,
        }
    }

    pub fn store(&self) -> &DynIdentityStore {
        &self.store
    }

    pub fn options(&self) -> &IdentityOptions {
        &self.options
    }

    pub fn email_sender(&self) -> &dyn EmailSender {
        self.email.as_ref()
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<ApplicationUser>, AppError> {
        self.store.find_user_by_id(user_id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationUser>, AppError> {
        self.store.find_user_by_email(&normalize(email)).await
    }

    async fn require_user(&self, user_id: &str) -> Result<ApplicationUser, AppError> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Unable to load user with ID '{}'.", user_id)))
    }

    /// Creates an unconfirmed account and sends its confirmation link.
    pub async fn register(&self, email: &str, password: &str) -> Result<Registration, AppError> {
        self.options.password.validate(password)?;

        if self.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken.",
                email.trim()
            )));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .store
            .create_user(&NewUser::new(email.trim(), password_hash))
            .await?;
        info!("User {} created a new account with password", user.id);

        let confirmation_code = self.send_confirmation(&user).await?;
        Ok(Registration {
            user,
            confirmation_code,
        })
    }

    async fn send_confirmation(&self, user: &ApplicationUser) -> Result<String, AppError> {
        let code = self
            .keys
            .generate_account_token(user, TokenPurpose::EmailConfirmation)?;
        let link = confirmation_link(&user.id, &code);
        self.email
            .send_confirmation_link(user, &user.email, &link)
            .await?;
        Ok(code)
    }

    pub async fn confirm_email(&self, user_id: &str, code: &str) -> Result<(), AppError> {
        let user = self.require_user(user_id).await?;
        self.keys
            .verify_account_token(&user, TokenPurpose::EmailConfirmation, code)?;
        self.store.confirm_email(&user.id).await
    }

    /// Sends a fresh confirmation link. `None` when no account has this email.
    pub async fn resend_confirmation(&self, email: &str) -> Result<Option<Registration>, AppError> {
        match self.find_by_email(email).await? {
            Some(user) => {
                let confirmation_code = self.send_confirmation(&user).await?;
                Ok(Some(Registration {
                    user,
                    confirmation_code,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn password_sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResult, AppError> {
        let user = match self.find_by_email(email).await? {
            Some(user) => user,
            None => return Ok(SignInResult::Failed),
        };

        if !verify_password(password, &user.password_hash)? {
            return Ok(SignInResult::Failed);
        }

        if self.options.sign_in.require_confirmed_account && !user.email_confirmed {
            warn!("User {} cannot sign in without a confirmed account", user.id);
            return Ok(SignInResult::NotAllowed);
        }

        let roles = self.store.roles_for_user(&user.id).await?;
        info!("User {} logged in", user.id);
        Ok(SignInResult::Succeeded(Principal::new(&user, roles)))
    }

    /// Issues a reset code for confirmed accounts. Unknown or unconfirmed
    /// emails get `None` so callers cannot tell them apart.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, AppError> {
        let user = match self.find_by_email(email).await? {
            Some(user) if user.email_confirmed => user,
            _ => return Ok(None),
        };

        let code = self
            .keys
            .generate_account_token(&user, TokenPurpose::ResetPassword)?;
        self.email
            .send_password_reset_code(&user, &user.email, &code)
            .await?;
        Ok(Some(code))
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid token.".into()))?;

        self.keys
            .verify_account_token(&user, TokenPurpose::ResetPassword, code)?;
        self.set_password(&user, new_password).await?;
        info!("User {} reset their password", user.id);
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self.require_user(user_id).await?;
        if !verify_password(current_password, &user.password_hash)? {
            return Err(AppError::BadRequest("Incorrect password.".into()));
        }
        self.set_password(&user, new_password).await?;
        info!("User {} changed their password", user.id);
        Ok(())
    }

    async fn set_password(&self, user: &ApplicationUser, password: &str) -> Result<(), AppError> {
        self.options.password.validate(password)?;
        let password_hash = hash_password(password)?;
        self.store
            .update_password(&user.id, &password_hash, &new_security_stamp())
            .await
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, AppError> {
        let user = self.require_user(user_id).await?;
        let roles = self.store.roles_for_user(&user.id).await?;
        Ok(UserProfile::new(&user, roles))
    }

    pub async fn create_role(&self, name: &str) -> Result<Role, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Role name cannot be empty.".into()));
        }
        let role = Role::new(name);
        if self.store.find_role(&role.normalized_name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Role name '{}' is already taken.",
                role.name
            )));
        }
        self.store.create_role(&role).await?;
        info!("Created role {}", role.name);
        Ok(role)
    }

    /// Returns the role, creating it first if it does not exist.
    pub async fn ensure_role(&self, name: &str) -> Result<Role, AppError> {
        match self.store.find_role(&normalize(name)).await? {
            Some(role) => Ok(role),
            None => self.create_role(name).await,
        }
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        self.store.list_roles().await
    }

    pub async fn add_to_role(&self, user_id: &str, role_name: &str) -> Result<(), AppError> {
        let user = self.require_user(user_id).await?;
        let role = self
            .store
            .find_role(&normalize(role_name))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} does not exist.", role_name)))?;
        self.store.add_user_to_role(&user.id, &role.id).await?;
        info!("Added user {} to role {}", user.id, role.name);
        Ok(())
    }

    pub async fn roles_for(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        self.store.roles_for_user(user_id).await
    }
}

/// Relative link the confirmation email points at.
pub fn confirmation_link(user_id: &str, code: &str) -> String {
    format!("/Account/ConfirmEmail?userId={}&code={}", user_id, code)
}

//! Account management: password policy, hashing, account tokens, email delivery and
//! the [`IdentityService`] that ties them to an [`IdentityStore`](crate::data::IdentityStore).

pub mod email;
pub mod manager;
pub mod password;
pub mod tokens;

pub use email::{EmailSender, NoOpEmailSender};
pub use manager::{IdentityService, Registration, SignInResult};
pub use password::{hash_password, verify_password, PasswordOptions};
pub use tokens::{TokenKeys, TokenPurpose};

/// Sign-in requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOptions {
    /// Refuse password sign-in until the account's email is confirmed.
    pub require_confirmed_account: bool,
}

impl Default for SignInOptions {
    fn default() -> Self {
        Self {
            require_confirmed_account: true,
        }
    }
}

/// Everything the identity layer is configured with at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityOptions {
    pub password: PasswordOptions,
    pub sign_in: SignInOptions,
}

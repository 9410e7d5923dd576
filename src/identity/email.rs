use async_trait::async_trait;
use log::info;

use crate::error::AppError;
use crate::models::ApplicationUser;

/// Delivers account emails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_confirmation_link(
        &self,
        user: &ApplicationUser,
        email: &str,
        confirmation_link: &str,
    ) -> Result<(), AppError>;

    async fn send_password_reset_code(
        &self,
        user: &ApplicationUser,
        email: &str,
        reset_code: &str,
    ) -> Result<(), AppError>;

    /// False when messages never reach the recipient. Account endpoints then
    /// hand the codes back in their responses instead.
    fn delivers(&self) -> bool {
        true
    }
}

/// Drops every message after logging that it would have been sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEmailSender;

#[async_trait]
impl EmailSender for NoOpEmailSender {
    async fn send_confirmation_link(
        &self,
        user: &ApplicationUser,
        email: &str,
        _confirmation_link: &str,
    ) -> Result<(), AppError> {
        info!("Not sending confirmation link to {} (user {})", email, user.id);
        Ok(())
    }

    async fn send_password_reset_code(
        &self,
        user: &ApplicationUser,
        email: &str,
        _reset_code: &str,
    ) -> Result<(), AppError> {
        info!("Not sending password reset code to {} (user {})", email, user.id);
        Ok(())
    }

    fn delivers(&self) -> bool {
        false
    }
}

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::AppError;
use crate::models::ApplicationUser;

/// How long email-confirmation and password-reset codes stay valid.
pub const ACCOUNT_TOKEN_LIFETIME_HOURS: i64 = 24;

/// HMAC keys shared by account tokens and authentication cookies.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies signature and expiry.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<T>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

/// What an account token may be used for. A token issued for one purpose is
/// rejected for every other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    EmailConfirmation,
    ResetPassword,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountTokenClaims {
    sub: String,
    purpose: TokenPurpose,
    /// Security stamp at issue time. Rotating the stamp revokes the token.
    stamp: String,
    iat: i64,
    exp: i64,
}

impl TokenKeys {
    pub fn generate_account_token(
        &self,
        user: &ApplicationUser,
        purpose: TokenPurpose,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = AccountTokenClaims {
            sub: user.id.clone(),
            purpose,
            stamp: user.security_stamp.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(ACCOUNT_TOKEN_LIFETIME_HOURS)).timestamp(),
        };
        self.sign(&claims)
    }

    /// Any mismatch (user, purpose or security stamp) is reported as the same
    /// generic invalid-token error.
    pub fn verify_account_token(
        &self,
        user: &ApplicationUser,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<(), AppError> {
        let invalid = || AppError::BadRequest("Invalid token.".into());
        let claims: AccountTokenClaims = self.verify(token).map_err(|_| invalid())?;

        if claims.sub != user.id || claims.purpose != purpose || claims.stamp != user.security_stamp
        {
            return Err(invalid());
        }
        Ok(())
    }
}

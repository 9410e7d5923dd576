use std::collections::HashMap;

use super::{AuthenticationState, Principal};
use crate::error::AppError;

pub const REQUIRE_ADMINISTRATOR_ROLE: &str = "RequireAdministratorRole";
pub const ADMIN_ROLE: &str = "Admin";

/// A named requirement on the signed-in principal. A principal satisfies a
/// role requirement by holding any one of the listed roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    pub name: String,
    pub required_roles: Vec<String>,
}

impl AuthorizationPolicy {
    pub fn require_role(name: &str, roles: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            required_roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn is_satisfied_by(&self, principal: &Principal) -> bool {
        self.required_roles.is_empty()
            || self.required_roles.iter().any(|r| principal.is_in_role(r))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationOptions {
    policies: HashMap<String, AuthorizationPolicy>,
}

impl AuthorizationOptions {
    pub fn add_policy(&mut self, policy: AuthorizationPolicy) -> &mut Self {
        self.policies.insert(policy.name.clone(), policy);
        self
    }

    pub fn policy(&self, name: &str) -> Option<&AuthorizationPolicy> {
        self.policies.get(name)
    }

    /// 401 for anonymous callers, 403 for principals that fail the policy.
    pub fn authorize<'a>(
        &self,
        policy_name: &str,
        state: &'a AuthenticationState,
    ) -> Result<&'a Principal, AppError> {
        let policy = self.policy(policy_name).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "The AuthorizationPolicy named: '{}' was not found.",
                policy_name
            ))
        })?;

        let principal = state
            .principal()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

        if policy.is_satisfied_by(principal) {
            Ok(principal)
        } else {
            Err(AppError::Forbidden("Access denied".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> AuthorizationOptions {
        let mut options = AuthorizationOptions::default();
        options.add_policy(AuthorizationPolicy::require_role(
            REQUIRE_ADMINISTRATOR_ROLE,
            &[ADMIN_ROLE],
        ));
        options
    }

    fn signed_in(roles: &[&str]) -> AuthenticationState {
        AuthenticationState::Authenticated(Principal {
            user_id: "7".into(),
            email: "kim@example.com".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            security_stamp: "S".into(),
        })
    }

    #[test]
    fn test_admin_policy() {
        let options = options();

        assert!(options
            .authorize(REQUIRE_ADMINISTRATOR_ROLE, &signed_in(&["Admin"]))
            .is_ok());
        assert!(matches!(
            options.authorize(REQUIRE_ADMINISTRATOR_ROLE, &signed_in(&["Editor"])),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            options.authorize(REQUIRE_ADMINISTRATOR_ROLE, &AuthenticationState::Anonymous),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_unknown_policy() {
        assert!(matches!(
            options().authorize("Nope", &signed_in(&["Admin"])),
            Err(AppError::InternalServerError(_))
        ));
    }
}

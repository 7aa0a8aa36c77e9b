use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

/// Opaque per-user settings blob owned by the UI layer.
pub type ProfileData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Login(String);

impl Login {
    pub fn new<T: Into<String>>(login: T) -> Self {
        Login(login.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Login {
    fn from(value: &str) -> Self {
        Login::new(value)
    }
}

impl From<String> for Login {
    fn from(value: String) -> Self {
        Login(value)
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub login: Login,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hash_type: String,
    pub admin: bool,
    pub active: bool,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
    /// API secret used by clients that authenticate with a precomputed digest.
    pub md5_api: Vec<u8>,
    pub profile_data: ProfileData,
}

impl User {
    pub fn new<T: Into<Login>>(login: T) -> Self {
        Self {
            login: login.into(),
            active: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.login.is_empty() {
            return Err(StoreError::validation("user has no login"));
        }
        if !self.email.is_empty() {
            let valid = self
                .email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Err(StoreError::validation(format!(
                    "user {} has an invalid email `{}`",
                    self.login, self.email
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_login_fails_validation() {
        let user = User::new("  ");
        assert!(matches!(user.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn email_must_have_domain() {
        let mut user = User::new("alice");
        user.email = "alice@localhost".into();
        assert!(user.validate().is_err());
        user.email = "alice@example.com".into();
        assert!(user.validate().is_ok());
    }
}

//! Role → credential resolution

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::KeyValueStore;
use crate::error::{E2eError, E2eResult};

/// The closed set of roles scenarios may act as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Librarian,
    Student,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Librarian, Role::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Librarian => "librarian",
            Role::Student => "student",
        }
    }

    fn username_key(&self) -> String {
        format!("{}_username", self.as_str())
    }

    fn password_key(&self) -> String {
        format!("{}_password", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "librarian" => Ok(Role::Librarian),
            "student" => Ok(Role::Student),
            _ => Err(E2eError::UnknownRole(s.to_string())),
        }
    }
}

/// An email/password pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Looks up the configured credentials for a role
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Parse a role name and resolve it in one go
    pub fn resolve_name(&self, role: &str) -> E2eResult<Credentials> {
        self.resolve(role.parse()?)
    }

    pub fn resolve(&self, role: Role) -> E2eResult<Credentials> {
        let email = self.required(&role.username_key())?;
        let password = self.required(&role.password_key())?;
        Ok(Credentials { email, password })
    }

    fn required(&self, key: &str) -> E2eResult<String> {
        match self.store.property(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(E2eError::Config(format!("property '{}' is not set", key))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::collections::HashMap;
    use test_case::test_case;

    fn resolver() -> CredentialResolver {
        let mut props = HashMap::new();
        props.insert("librarian_username".to_string(), "librarian7@library".to_string());
        props.insert("librarian_password".to_string(), "libpass".to_string());
        props.insert("student_username".to_string(), "student12@library".to_string());
        props.insert("student_password".to_string(), "stupass".to_string());
        CredentialResolver::new(Arc::new(props))
    }

    #[test]
    fn test_every_known_role_resolves() {
        let resolver = resolver();
        for role in Role::ALL {
            let creds = resolver.resolve(role).unwrap();
            assert!(!creds.email.is_empty());
            assert!(!creds.password.is_empty());
        }
    }

    #[test_case("librarian", "librarian7@library" ; "lowercase")]
    #[test_case(" Student ", "student12@library" ; "mixed case with padding")]
    fn test_role_names_parse(name: &str, email: &str) {
        assert_eq!(resolver().resolve_name(name).unwrap().email, email);
    }

    #[test_case("admin" ; "admin")]
    #[test_case("" ; "empty")]
    #[test_case("librarians" ; "plural")]
    fn test_unknown_role_is_rejected(name: &str) {
        let err = resolver().resolve_name(name).unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnknownRole);
    }

    #[test]
    fn test_missing_property_is_config_error_not_unknown_role() {
        let mut props = HashMap::new();
        props.insert("student_username".to_string(), "student12@library".to_string());
        props.insert("student_password".to_string(), "  ".to_string());
        let resolver = CredentialResolver::new(Arc::new(props));

        let err = resolver.resolve(Role::Student).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
        assert!(err.to_string().contains("student_password"));
    }
}

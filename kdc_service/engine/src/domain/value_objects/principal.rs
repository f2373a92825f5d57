//! PrincipalSpec value object
//! `name` or `name:password`, realm suffix ignored

use crate::domain::constants::kerberos::DEFAULT_PASSWORD;
use crate::domain::{DomainError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalSpec {
    pub name: String,
    pub password: String,
}

impl PrincipalSpec {
    pub fn new(name: &str, password: Option<&str>) -> Result<Self> {
        let name = strip_realm(name);
        if name.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "principal name must not be empty".to_string(),
            ));
        }
        let password = password.unwrap_or(DEFAULT_PASSWORD);
        // kadmin reads a query as a single line
        if name.chars().chain(password.chars()).any(char::is_control) {
            return Err(DomainError::InvalidConfiguration(format!(
                "principal '{}' contains control characters",
                name.escape_debug()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            password: password.to_string(),
        })
    }
}

impl FromStr for PrincipalSpec {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once(':') {
            Some((name, password)) => PrincipalSpec::new(name.trim(), Some(password)),
            None => PrincipalSpec::new(s.trim(), None),
        }
    }
}

impl fmt::Display for PrincipalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the password
        write!(f, "{}", self.name)
    }
}

/// `alice@TEST.LOCAL` → `alice`
pub fn strip_realm(name: &str) -> &str {
    match name.split_once('@') {
        Some((local, _)) => local,
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let spec: PrincipalSpec = "alice".parse().unwrap();
        assert_eq!(spec.name, "alice");
        assert_eq!(spec.password, "csmake");
    }

    #[test]
    fn test_parse_with_password() {
        let spec: PrincipalSpec = "bob:s3cr:et".parse().unwrap();
        assert_eq!(spec.name, "bob");
        assert_eq!(spec.password, "s3cr:et");
    }

    #[test]
    fn test_realm_suffix_stripped() {
        let spec: PrincipalSpec = "carol@TEST.LOCAL:pw".parse().unwrap();
        assert_eq!(spec.name, "carol");
        assert_eq!(spec.password, "pw");
        assert_eq!(strip_realm("host/box@REALM"), "host/box");
        assert_eq!(strip_realm("plain"), "plain");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!("@REALM".parse::<PrincipalSpec>().is_err());
        assert!(":pw".parse::<PrincipalSpec>().is_err());
    }

    #[test]
    fn test_control_characters_rejected() {
        assert!(PrincipalSpec::new("alice\nbob", None).is_err());
        assert!(PrincipalSpec::new("alice", Some("pw\n-q delete_principal x")).is_err());
        assert!(PrincipalSpec::new("alice", Some("pass word \"quoted\"")).is_ok());
    }

    #[test]
    fn test_display_hides_password() {
        let spec: PrincipalSpec = "alice:hunter2".parse().unwrap();
        assert_eq!(spec.to_string(), "alice");
    }
}

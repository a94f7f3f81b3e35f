//! Caller role identifier.
//!
//! This module defines the [`Role`] type, the opaque label asserted by the
//! caller's authentication layer.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An opaque role label.
///
/// Roles are supplied by an external authentication collaborator and are
/// trusted as already verified. The gateway never derives a role from request
/// content and makes no assumption about its encoding beyond equality.
///
/// # Examples
///
/// ```
/// use fieldgate::types::Role;
///
/// let role = Role::new("hr");
/// assert_eq!(role.as_str(), "hr");
/// assert_eq!(role, Role::from("hr"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Creates a new role from the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the role label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role({})", self.0)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_equality_is_exact() {
        assert_eq!(Role::new("hr"), Role::new("hr"));
        assert_ne!(Role::new("hr"), Role::new("HR"));
        assert_ne!(Role::new("hr"), Role::new("hr "));
    }

    #[test]
    fn test_role_serde_transparent() {
        let role = Role::new("user");
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, "\"user\"");

        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed.as_str(), "admin");
    }

    #[test]
    fn test_role_display_and_debug() {
        let role: Role = "guest".parse().unwrap();
        assert_eq!(role.to_string(), "guest");
        assert_eq!(format!("{:?}", role), "Role(guest)");
    }
}

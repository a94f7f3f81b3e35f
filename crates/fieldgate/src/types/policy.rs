//! Per-field access policies.
//!
//! An [`AccessPolicy`] travels with every record as a sibling `accessPolicy`
//! attribute. Its persisted layout is:
//!
//! ```json
//! { "salary": { "role": ["hr"] }, "name": { "role": ["hr", "user"] } }
//! ```
//!
//! Seeding scripts and administrative consoles must honor this layout.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::Role;

/// The set of roles permitted to read one field.
///
/// An empty set hides the field from everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPolicy {
    /// Roles allowed to read the field.
    #[serde(rename = "role", default)]
    pub roles: BTreeSet<Role>,
}

impl FieldPolicy {
    /// Creates a policy allowing exactly the given roles.
    pub fn new<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a policy that hides the field from every role.
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Returns true if `role` is a member of the permitted set.
    pub fn allows(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Returns true if no role may read the field.
    pub fn is_hidden(&self) -> bool {
        self.roles.is_empty()
    }
}

/// A mapping from field name to [`FieldPolicy`].
///
/// Fields without an entry are denied to every role.
///
/// # Examples
///
/// ```
/// use fieldgate::types::{AccessPolicy, Role};
///
/// let policy = AccessPolicy::new()
///     .with_field("salary", ["hr"])
///     .with_field("name", ["hr", "user"]);
///
/// assert!(policy.allows("salary", &Role::new("hr")));
/// assert!(!policy.allows("salary", &Role::new("user")));
/// assert!(!policy.allows("department", &Role::new("hr")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPolicy {
    fields: BTreeMap<String, FieldPolicy>,
}

impl AccessPolicy {
    /// Creates an empty policy that denies every field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the policy of a field.
    pub fn with_field<I, R>(mut self, field: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        self.fields.insert(field.into(), FieldPolicy::new(roles));
        self
    }

    /// Returns the policy of a field, if one is declared.
    pub fn field_policy(&self, field: &str) -> Option<&FieldPolicy> {
        self.fields.get(field)
    }

    /// Returns true if `role` may read `field`.
    ///
    /// Undeclared fields are denied.
    pub fn allows(&self, field: &str, role: &Role) -> bool {
        self.fields
            .get(field)
            .is_some_and(|policy| policy.allows(role))
    }

    /// Grants `role` read access to `field`, declaring the field if needed.
    ///
    /// Returns true if the role was newly added.
    pub fn grant(&mut self, field: impl Into<String>, role: Role) -> bool {
        self.fields.entry(field.into()).or_default().roles.insert(role)
    }

    /// Revokes read access to `field` from `role`.
    ///
    /// The field stays declared even when its role set becomes empty, so
    /// it remains explicitly hidden. Returns true if the role was present.
    pub fn revoke(&mut self, field: &str, role: &Role) -> bool {
        self.fields
            .get_mut(field)
            .is_some_and(|policy| policy.roles.remove(role))
    }

    /// Iterates over declared fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldPolicy)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

//! Policy-carrying records.
//!
//! A [`Record`] is an identifier, a mapping of field name to value, and the
//! [`AccessPolicy`] stored next to the data. The persisted layout is a flat
//! document with the policy as a sibling attribute:
//!
//! ```json
//! {
//!   "id": 1,
//!   "name": "Alice",
//!   "salary": 100000,
//!   "department": "HR",
//!   "accessPolicy": {
//!     "salary": { "role": ["hr"] },
//!     "name": { "role": ["hr", "user"] },
//!     "department": { "role": ["hr", "user"] }
//!   }
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AccessPolicy;
use crate::error::RecordError;

/// Name of the sibling attribute holding the access policy.
pub const ACCESS_POLICY_ATTRIBUTE: &str = "accessPolicy";

/// Identifier attribute used by the flat layout.
pub const ID_ATTRIBUTE: &str = "id";

/// Identifier attribute used by document stores.
pub const DOCUMENT_ID_ATTRIBUTE: &str = "_id";

/// A record identifier.
///
/// Identifiers are immutable once a record is created. Integer and string
/// forms are kept apart so a record round-trips through a backend unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric identifier.
    Int(i64),
    /// Textual identifier, including ObjectId hex strings.
    Text(String),
}

impl RecordId {
    /// Generates a random textual identifier.
    pub fn generate() -> Self {
        RecordId::Text(uuid::Uuid::new_v4().to_string())
    }

    /// Reads an identifier from a JSON value.
    ///
    /// Accepts strings, integers and extended-JSON ObjectIds
    /// (`{"$oid": "..."}`).
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        match value {
            Value::String(s) => Ok(RecordId::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(RecordId::Int).ok_or_else(|| {
                RecordError::InvalidId {
                    found: n.to_string(),
                }
            }),
            Value::Object(map) => match map.get("$oid") {
                Some(Value::String(oid)) if map.len() == 1 => Ok(RecordId::Text(oid.clone())),
                _ => Err(RecordError::InvalidId {
                    found: value.to_string(),
                }),
            },
            other => Err(RecordError::InvalidId {
                found: other.to_string(),
            }),
        }
    }

    /// Returns the identifier as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(i) => Value::from(*i),
            RecordId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

/// A data record with its embedded access policy.
///
/// # Examples
///
/// ```
/// use fieldgate::types::{AccessPolicy, Record, Role};
/// use serde_json::json;
///
/// let record = Record::from_document(json!({
///     "id": 1,
///     "name": "Alice",
///     "accessPolicy": {"name": {"role": ["user"]}}
/// }))
/// .unwrap();
///
/// assert_eq!(record.get("name"), Some(&json!("Alice")));
/// assert!(record.access_policy().allows("name", &Role::new("user")));
/// assert!(record.get("accessPolicy").is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    fields: Map<String, Value>,
    access_policy: AccessPolicy,
}

impl Record {
    /// Creates a record from its parts.
    ///
    /// Identifier and policy attributes inside `fields` are dropped; they are
    /// carried by `id` and `access_policy`.
    pub fn new(id: RecordId, mut fields: Map<String, Value>, access_policy: AccessPolicy) -> Self {
        fields.remove(ID_ATTRIBUTE);
        fields.remove(DOCUMENT_ID_ATTRIBUTE);
        fields.remove(ACCESS_POLICY_ATTRIBUTE);
        Self {
            id,
            fields,
            access_policy,
        }
    }

    /// Reads a record from its persisted document layout.
    ///
    /// `_id` takes precedence over `id` when both are present. A document
    /// without an `accessPolicy` attribute gets an empty policy, which denies
    /// every field.
    pub fn from_document(document: Value) -> Result<Self, RecordError> {
        let mut map = match document {
            Value::Object(map) => map,
            other => {
                return Err(RecordError::NotAnObject {
                    found: json_type_name(&other),
                });
            }
        };

        let raw_id = match map.remove(DOCUMENT_ID_ATTRIBUTE) {
            Some(id) => {
                map.remove(ID_ATTRIBUTE);
                id
            }
            None => map.remove(ID_ATTRIBUTE).ok_or(RecordError::MissingId)?,
        };
        let id = RecordId::from_value(&raw_id)?;

        let access_policy = match map.remove(ACCESS_POLICY_ATTRIBUTE) {
            Some(Value::Null) | None => AccessPolicy::new(),
            Some(policy) => {
                serde_json::from_value(policy).map_err(RecordError::InvalidPolicy)?
            }
        };

        Ok(Self {
            id,
            fields: map,
            access_policy,
        })
    }

    /// Writes the record back to the flat document layout.
    pub fn to_document(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 2);
        map.insert(ID_ATTRIBUTE.to_string(), self.id.to_value());
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        map.insert(
            ACCESS_POLICY_ATTRIBUTE.to_string(),
            serde_json::to_value(&self.access_policy).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }

    /// Removes fields whose value is `null`.
    ///
    /// Fixed-schema stores cannot tell a null column from a missing one, so
    /// adapters return records in this form.
    pub fn without_nulls(mut self) -> Self {
        self.fields.retain(|_, value| !value.is_null());
        self
    }

    /// Returns the record identifier.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns the value of a data field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns all data fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the embedded access policy.
    pub fn access_policy(&self) -> &AccessPolicy {
        &self.access_policy
    }

    /// Returns a mutable reference to the access policy.
    ///
    /// Policy changes are administrative operations; the gateway itself
    /// never mutates records.
    pub fn access_policy_mut(&mut self) -> &mut AccessPolicy {
        &mut self.access_policy
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

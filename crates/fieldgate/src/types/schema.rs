//! Record schemas and field types.
//!
//! The schema is the allow-list of queryable and projectable fields. Each
//! field carries a [`FieldType`] which selects the character allow-list used
//! when validating untrusted values for that field.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// ASCII letters only, e.g. person names.
    Alpha,
    /// Decimal digits with a single optional leading sign.
    Integer,
    /// Letters, digits, spaces, `_`, `-` and `.`.
    Label,
    /// Letters, digits, `_` and `-`.
    Identifier,
}

impl FieldType {
    /// Returns the lowercase name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Alpha => "alpha",
            FieldType::Integer => "integer",
            FieldType::Label => "label",
            FieldType::Identifier => "identifier",
        }
    }

    /// Returns true if a stored value has the representation this type
    /// requires. Null stands for an absent value and is accepted by every
    /// type.
    ///
    /// ```
    /// use fieldgate::types::FieldType;
    /// use serde_json::json;
    ///
    /// assert!(FieldType::Integer.accepts(&json!(42)));
    /// assert!(!FieldType::Label.accepts(&json!(42)));
    /// assert!(!FieldType::Integer.accepts(&json!(true)));
    /// ```
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::Integer, Value::Number(n)) => n.as_i64().is_some(),
            (FieldType::Integer, _) => false,
            (_, Value::String(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One field of a [`RecordSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as stored in the backend.
    pub name: String,
    /// Declared value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldSpec {
    /// Creates a new field spec.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered allow-list of record fields.
///
/// # Examples
///
/// ```
/// use fieldgate::types::{FieldType, RecordSchema};
///
/// let schema = RecordSchema::new()
///     .with_field("name", FieldType::Alpha)
///     .with_field("salary", FieldType::Integer);
///
/// assert!(schema.contains("name"));
/// assert!(!schema.contains("password"));
/// assert_eq!(schema.field_type("salary"), Some(FieldType::Integer));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// The employee schema used by the bundled demo data:
    /// `name` (alpha), `salary` (integer), `department` (label).
    pub fn employees() -> Self {
        Self::new()
            .with_field("name", FieldType::Alpha)
            .with_field("salary", FieldType::Integer)
            .with_field("department", FieldType::Label)
    }

    /// Appends a field. A field that is already declared keeps its position
    /// and takes the new type.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.field_type = field_type,
            None => self.fields.push(FieldSpec::new(name, field_type)),
        }
        self
    }

    /// Returns the spec of a field.
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if the field is in the allow-list.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the declared type of a field.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.get(name).map(|f| f.field_type)
    }

    /// Iterates over fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    /// Returns the field names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema declares no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

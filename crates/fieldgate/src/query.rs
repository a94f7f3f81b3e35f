//! Query intents and backend-agnostic queries.
//!
//! A [`QueryIntent`] is the typed request `(field, operator, value)`. The
//! [`QueryBuilder`] checks the field against the schema allow-list and emits a
//! [`BackendQuery`]: an abstract tuple that adapters bind natively. No query
//! text is ever produced here.
//!
//! # Examples
//!
//! ```
//! use fieldgate::query::{QueryBuilder, QueryIntent};
//! use fieldgate::types::{FieldType, RecordSchema};
//! use fieldgate::validation::InputValidator;
//!
//! let schema = RecordSchema::employees();
//! let value = InputValidator::default()
//!     .validate("IT", FieldType::Label)
//!     .unwrap();
//!
//! let query = QueryBuilder::new(&schema)
//!     .build(&QueryIntent::equals("department", value))
//!     .unwrap();
//!
//! assert_eq!(query.field(), "department");
//! assert_eq!(query.projection(), ["name", "salary", "department"]);
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::QueryError;
use crate::types::RecordSchema;
use crate::validation::ValidatedValue;

/// Comparison operators supported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Exact equality.
    Equals,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals => write!(f, "equals"),
        }
    }
}

/// A raw, untrusted field query as received from a caller.
///
/// Nothing in this type has been checked. The gateway validates it into a
/// [`QueryIntent`] before anything else happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldQuery {
    /// Field name as supplied by the caller.
    pub field: String,
    /// Value as supplied by the caller.
    pub value: String,
}

impl FieldQuery {
    /// Creates a raw equality query.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A typed query request built only from validated values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIntent {
    field: String,
    operator: Operator,
    value: ValidatedValue,
}

impl QueryIntent {
    /// Creates an equality intent.
    pub fn equals(field: impl Into<String>, value: ValidatedValue) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Equals,
            value,
        }
    }

    /// Returns the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the validated value.
    pub fn value(&self) -> &ValidatedValue {
        &self.value
    }
}

/// Abstract backend query.
///
/// The field name is guaranteed to be in the schema and the value is a
/// validated scalar. Adapters translate this into their native bound form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendQuery {
    field: String,
    operator: Operator,
    value: ValidatedValue,
    projection: Vec<String>,
}

impl BackendQuery {
    /// Returns the predicate field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the predicate operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Returns the bound value.
    pub fn value(&self) -> &ValidatedValue {
        &self.value
    }

    /// Returns the schema fields the adapter should fetch.
    pub fn projection(&self) -> &[String] {
        &self.projection
    }
}

/// Builds [`BackendQuery`] values against a schema allow-list.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    schema: &'a RecordSchema,
}

impl<'a> QueryBuilder<'a> {
    /// Creates a builder for the given schema.
    pub fn new(schema: &'a RecordSchema) -> Self {
        Self { schema }
    }

    /// Builds a backend query from an intent.
    ///
    /// Fails with [`QueryError::UnknownField`] if the field is not declared
    /// in the schema.
    pub fn build(&self, intent: &QueryIntent) -> Result<BackendQuery, QueryError> {
        if !self.schema.contains(&intent.field) {
            return Err(QueryError::UnknownField {
                field: intent.field.clone(),
            });
        }

        Ok(BackendQuery {
            field: intent.field.clone(),
            operator: intent.operator,
            value: intent.value.clone(),
            projection: self.schema.field_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;
    use crate::validation::InputValidator;

    fn text(raw: &str) -> ValidatedValue {
        InputValidator::default()
            .validate(raw, FieldType::Label)
            .unwrap()
    }

    #[test]
    fn test_build_known_field() {
        let schema = RecordSchema::employees();
        let query = QueryBuilder::new(&schema)
            .build(&QueryIntent::equals("name", text("Alice")))
            .unwrap();

        assert_eq!(query.field(), "name");
        assert_eq!(query.operator(), Operator::Equals);
        assert_eq!(query.value().as_text(), Some("Alice"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = RecordSchema::employees();
        let err = QueryBuilder::new(&schema)
            .build(&QueryIntent::equals("password", text("x")))
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                field: "password".to_string()
            }
        );
    }

    #[test]
    fn test_policy_attribute_is_not_queryable() {
        let schema = RecordSchema::employees();
        let result =
            QueryBuilder::new(&schema).build(&QueryIntent::equals("accessPolicy", text("hr")));
        assert!(result.is_err());
    }

    #[test]
    fn test_field_name_match_is_exact() {
        let schema = RecordSchema::employees();
        let builder = QueryBuilder::new(&schema);
        assert!(builder.build(&QueryIntent::equals("Name", text("x"))).is_err());
        assert!(
            builder
                .build(&QueryIntent::equals("name; DROP TABLE", text("x")))
                .is_err()
        );
    }

    #[test]
    fn test_projection_follows_schema_order() {
        let schema = RecordSchema::new()
            .with_field("b", FieldType::Alpha)
            .with_field("a", FieldType::Alpha);
        let query = QueryBuilder::new(&schema)
            .build(&QueryIntent::equals("a", text("x")))
            .unwrap();
        assert_eq!(query.projection(), ["b", "a"]);
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(Operator::Equals.to_string(), "equals");
    }
}

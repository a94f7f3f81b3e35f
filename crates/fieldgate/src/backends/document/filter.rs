//! Native filter documents.
//!
//! A [`NativeFilter`] is the document-store form of a [`BackendQuery`]:
//!
//! ```json
//! { "department": { "$eq": "IT" } }
//! ```
//!
//! It is assembled as a structured value; the caller value only ever lands in
//! the operand position of `$eq`, so it is matched as a literal.

use serde_json::{Map, Value};

use crate::query::{BackendQuery, Operator};
use crate::types::{ACCESS_POLICY_ATTRIBUTE, DOCUMENT_ID_ATTRIBUTE};

/// Equality operator of the native filter syntax.
pub const EQ_OPERATOR: &str = "$eq";

/// A structured filter plus projection for a document store.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeFilter {
    field: String,
    operand: Value,
    projection: Vec<String>,
}

impl NativeFilter {
    /// Translates a backend query.
    pub fn from_query(query: &BackendQuery) -> Self {
        let operand = match query.operator() {
            Operator::Equals => query.value().to_json(),
        };
        Self {
            field: query.field().to_string(),
            operand,
            projection: query.projection().to_vec(),
        }
    }

    /// Returns the predicate field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the literal the field is compared with.
    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Returns the filter document `{ field: { "$eq": operand } }`.
    pub fn filter_document(&self) -> Value {
        let mut condition = Map::new();
        condition.insert(EQ_OPERATOR.to_string(), self.operand.clone());
        let mut filter = Map::new();
        filter.insert(self.field.clone(), Value::Object(condition));
        Value::Object(filter)
    }

    /// Returns the projection document: schema fields, the identifier and
    /// the access policy.
    pub fn projection_document(&self) -> Value {
        let mut projection: Map<String, Value> = self
            .projection
            .iter()
            .map(|field| (field.clone(), Value::from(1)))
            .collect();
        projection.insert(DOCUMENT_ID_ATTRIBUTE.to_string(), Value::from(1));
        projection.insert(ACCESS_POLICY_ATTRIBUTE.to_string(), Value::from(1));
        Value::Object(projection)
    }

    /// Evaluates the filter against a stored document.
    ///
    /// Follows document-store equality: numbers compare by value regardless
    /// of integer or float encoding, and an array field matches when any
    /// element is equal.
    pub fn matches(&self, document: &Value) -> bool {
        match document.get(&self.field) {
            Some(Value::Array(items)) if !self.operand.is_array() => {
                items.iter().any(|item| scalar_eq(item, &self.operand))
            }
            Some(value) => scalar_eq(value, &self.operand),
            None => self.operand.is_null(),
        }
    }

    /// Applies the projection to a stored document.
    pub fn project(&self, document: &Value) -> Value {
        let Value::Object(source) = document else {
            return document.clone();
        };
        let keep = |key: &str| {
            key == DOCUMENT_ID_ATTRIBUTE
                || key == ACCESS_POLICY_ATTRIBUTE
                || self.projection.iter().any(|f| f == key)
        };
        Value::Object(
            source
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

fn scalar_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

//! Role-aware projection of records.
//!
//! [`AccessFilter::project`] reduces a record to the fields a role may read.
//! Only schema fields are considered, a field without a policy entry is
//! denied, and the `accessPolicy` attribute is never part of the output.
//! Projection never fails: an unrecognized role gets an empty projection.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{AccessPolicy, Record, RecordId, RecordSchema, Role};

/// The visible part of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredRecord {
    id: RecordId,
    fields: Map<String, Value>,
}

impl FilteredRecord {
    /// Returns the identifier of the source record.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Returns the visible fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a visible field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns true if no field is visible.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consumes the record, returning the visible fields.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Projects records to their role-visible fields.
#[derive(Debug, Clone)]
pub struct AccessFilter {
    schema: RecordSchema,
}

impl AccessFilter {
    /// Creates a filter over the given schema.
    pub fn new(schema: RecordSchema) -> Self {
        Self { schema }
    }

    /// Returns the schema used for projection.
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Projects `record` to the fields `role` may read.
    ///
    /// Included values are copied unchanged and appear in schema order. The
    /// result depends only on the record, the role and the schema.
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldgate::filter::AccessFilter;
    /// use fieldgate::types::{Record, RecordSchema, Role};
    /// use serde_json::json;
    ///
    /// let record = Record::from_document(json!({
    ///     "id": 1,
    ///     "name": "Alice",
    ///     "salary": 100000,
    ///     "department": "HR",
    ///     "accessPolicy": {
    ///         "salary": {"role": ["hr"]},
    ///         "name": {"role": ["hr", "user"]},
    ///         "department": {"role": ["hr", "user"]}
    ///     }
    /// }))
    /// .unwrap();
    ///
    /// let filter = AccessFilter::new(RecordSchema::employees());
    /// let visible = filter.project(&record, &Role::new("user"));
    ///
    /// assert_eq!(visible.get("name"), Some(&json!("Alice")));
    /// assert!(visible.get("salary").is_none());
    /// ```
    pub fn project(&self, record: &Record, role: &Role) -> FilteredRecord {
        let policy = record.access_policy();
        let fields = self
            .schema
            .fields()
            .filter(|spec| policy.allows(&spec.name, role))
            .filter_map(|spec| {
                record
                    .get(&spec.name)
                    .map(|value| (spec.name.clone(), value.clone()))
            })
            .collect();

        FilteredRecord {
            id: record.id().clone(),
            fields,
        }
    }

    /// Returns the schema fields `role` may read under `policy`, regardless
    /// of whether a record actually carries them.
    pub fn visible_fields(&self, policy: &AccessPolicy, role: &Role) -> BTreeSet<String> {
        self.schema
            .fields()
            .filter(|spec| policy.allows(&spec.name, role))
            .map(|spec| spec.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> Record {
        Record::from_document(json!({
            "id": 1,
            "name": "Alice",
            "salary": 100000,
            "department": "HR",
            "accessPolicy": {
                "salary": {"role": ["hr"]},
                "name": {"role": ["hr", "user"]},
                "department": {"role": ["hr", "user"]}
            }
        }))
        .unwrap()
    }

    fn filter() -> AccessFilter {
        AccessFilter::new(RecordSchema::employees())
    }

    #[test]
    fn test_user_projection() {
        let visible = filter().project(&alice(), &Role::new("user"));
        assert_eq!(
            Value::Object(visible.into_fields()),
            json!({"name": "Alice", "department": "HR"})
        );
    }

    #[test]
    fn test_hr_projection() {
        let visible = filter().project(&alice(), &Role::new("hr"));
        assert_eq!(
            Value::Object(visible.into_fields()),
            json!({"name": "Alice", "salary": 100000, "department": "HR"})
        );
    }

    #[test]
    fn test_projection_keeps_schema_order() {
        let visible = filter().project(&alice(), &Role::new("hr"));
        let keys: Vec<&str> = visible.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "salary", "department"]);

        let text = serde_json::to_string(visible.fields()).unwrap();
        assert_eq!(
            text,
            r#"{"name":"Alice","salary":100000,"department":"HR"}"#
        );
    }

    #[test]
    fn test_unknown_role_sees_nothing() {
        let visible = filter().project(&alice(), &Role::new("guest"));
        assert!(visible.is_empty());
        assert_eq!(visible.id(), &RecordId::Int(1));
    }

    #[test]
    fn test_field_without_policy_is_denied() {
        let record = Record::from_document(json!({
            "id": 2,
            "name": "Bob",
            "salary": 90000,
            "department": "IT",
            "accessPolicy": {"name": {"role": ["hr"]}}
        }))
        .unwrap();

        let visible = filter().project(&record, &Role::new("hr"));
        assert_eq!(Value::Object(visible.into_fields()), json!({"name": "Bob"}));
    }

    #[test]
    fn test_empty_role_list_hides_field() {
        let record = Record::from_document(json!({
            "id": 3,
            "salary": 1,
            "accessPolicy": {"salary": {"role": []}}
        }))
        .unwrap();
        assert!(filter().project(&record, &Role::new("hr")).is_empty());
    }

    #[test]
    fn test_non_schema_fields_are_never_projected() {
        let record = Record::from_document(json!({
            "id": 4,
            "name": "Dana",
            "ssn": "123-45-6789",
            "accessPolicy": {
                "name": {"role": ["hr"]},
                "ssn": {"role": ["hr"]},
                "accessPolicy": {"role": ["hr"]}
            }
        }))
        .unwrap();

        let visible = filter().project(&record, &Role::new("hr"));
        assert!(visible.get("ssn").is_none());
        assert!(visible.get("accessPolicy").is_none());
        assert_eq!(visible.fields().len(), 1);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let f = filter();
        let record = alice();
        let role = Role::new("user");
        assert_eq!(f.project(&record, &role), f.project(&record, &role));
    }

    #[test]
    fn test_included_values_are_unchanged() {
        let record = Record::from_document(json!({
            "id": 5,
            "name": {"first": "Eve", "tags": [1, 2]},
            "accessPolicy": {"name": {"role": ["user"]}}
        }))
        .unwrap();
        let visible = filter().project(&record, &Role::new("user"));
        assert_eq!(visible.get("name"), record.get("name"));
    }

    #[test]
    fn test_visible_fields() {
        let record = alice();
        let fields = filter().visible_fields(record.access_policy(), &Role::new("user"));
        assert_eq!(
            fields.into_iter().collect::<Vec<_>>(),
            vec!["department".to_string(), "name".to_string()]
        );
    }
}

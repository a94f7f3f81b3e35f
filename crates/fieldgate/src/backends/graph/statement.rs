//! Parameterized Cypher statements for the graph adapter.
//!
//! The matched property and its value are both bound as parameters and read
//! through dynamic property access (`n[$field]`). The only identifier spliced
//! into the text is the node label, which Cypher cannot parameterize; it is
//! checked against [`LABEL_PATTERN`] and backtick-quoted.

use regex::Regex;
use serde_json::Value;

use crate::error::{BackendError, BackendResult};
use crate::query::{BackendQuery, Operator};
use crate::types::{FieldSpec, Record, RecordId, RecordSchema};
use crate::validation::ScalarRef;

const BACKEND_NAME: &str = "neo4j";

/// Pattern the node label must match.
pub const LABEL_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

/// Node property holding the record identifier.
pub const ID_PROPERTY: &str = "id";

/// Node property holding the JSON-encoded access policy. Node properties
/// cannot be nested maps, so the policy is stored as text.
pub const POLICY_PROPERTY: &str = "accessPolicy";

/// A bound Cypher parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CypherParam {
    /// String parameter.
    Text(String),
    /// Integer parameter.
    Integer(i64),
    /// Map parameter, in insertion order.
    Map(Vec<(String, CypherParam)>),
}

impl From<ScalarRef<'_>> for CypherParam {
    fn from(value: ScalarRef<'_>) -> Self {
        match value {
            ScalarRef::Text(s) => CypherParam::Text(s.to_string()),
            ScalarRef::Integer(i) => CypherParam::Integer(i),
        }
    }
}

/// Cypher text with its named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CypherStatement {
    /// Statement text containing only the quoted label and `$name` references.
    pub text: String,
    /// Parameters by name.
    pub params: Vec<(String, CypherParam)>,
}

impl CypherStatement {
    fn new() -> Self {
        Self {
            text: String::new(),
            params: Vec::new(),
        }
    }

    /// Adds a named parameter and returns its reference.
    pub fn add_param(&mut self, name: impl Into<String>, param: CypherParam) -> String {
        let name = name.into();
        let reference = format!("${}", name);
        self.params.push((name, param));
        reference
    }

    /// Returns a parameter by name.
    pub fn param(&self, name: &str) -> Option<&CypherParam> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, param)| param)
    }
}

/// Checked node label and the typed properties read from each node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
    label: String,
    properties: Vec<FieldSpec>,
}

impl NodeLayout {
    /// Builds a layout from a schema, checking the label.
    pub fn new(label: &str, schema: &RecordSchema, pattern: &Regex) -> BackendResult<Self> {
        if !pattern.is_match(label) {
            return Err(configuration(format!("invalid node label '{}'", label)));
        }
        if let Some(reserved) = schema
            .fields()
            .find(|spec| spec.name == ID_PROPERTY || spec.name == POLICY_PROPERTY)
        {
            return Err(configuration(format!(
                "field '{}' collides with a reserved property",
                reserved.name
            )));
        }
        Ok(Self {
            label: label.to_string(),
            properties: schema.fields().cloned().collect(),
        })
    }

    /// Returns the node label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Builds the `MATCH` for a backend query.
    ///
    /// Projected properties are returned as `p0`, `p1`, ... in schema order,
    /// next to `id` and `policy`. Returns the statement and the projected
    /// property specs in column order.
    pub fn match_by_property(
        &self,
        query: &BackendQuery,
    ) -> BackendResult<(CypherStatement, Vec<FieldSpec>)> {
        self.require_property(query.field())?;
        if let Some(missing) = query
            .projection()
            .iter()
            .find(|p| self.property(p.as_str()).is_none())
        {
            return Err(configuration(format!(
                "label '{}' has no property '{}'",
                self.label, missing
            )));
        }
        let projected: Vec<FieldSpec> = self
            .properties
            .iter()
            .filter(|spec| query.projection().iter().any(|p| p == &spec.name))
            .cloned()
            .collect();

        let mut statement = CypherStatement::new();
        let field = statement.add_param("field", CypherParam::Text(query.field().to_string()));
        let value = statement.add_param("value", CypherParam::from(query.value().as_scalar()));
        let comparison = match query.operator() {
            Operator::Equals => "=",
        };

        let mut returns = vec![format!("n.{} AS id", ID_PROPERTY)];
        for (index, spec) in projected.iter().enumerate() {
            let column = column_name(index);
            let reference = statement.add_param(column.clone(), CypherParam::Text(spec.name.clone()));
            returns.push(format!("n[{}] AS {}", reference, column));
        }
        returns.push(format!("n.{} AS policy", POLICY_PROPERTY));

        statement.text = format!(
            "MATCH (n:{}) WHERE n[{}] {} {} RETURN {} ORDER BY id",
            quote(&self.label),
            field,
            comparison,
            value,
            returns.join(", ")
        );
        Ok((statement, projected))
    }

    /// Builds the upsert for one record.
    ///
    /// The node is merged on its identifier and its properties replaced by
    /// the schema fields of the record. Null fields are left unset; any
    /// other value must match the declared field type.
    pub fn merge(&self, record: &Record) -> BackendResult<CypherStatement> {
        let id = match record.id() {
            RecordId::Int(i) => CypherParam::Integer(*i),
            RecordId::Text(s) => CypherParam::Text(s.clone()),
        };
        let policy = serde_json::to_string(record.access_policy()).map_err(|e| {
            BackendError::protocol(BACKEND_NAME, format!("failed to encode policy: {}", e))
        })?;

        let mut properties = vec![(ID_PROPERTY.to_string(), id.clone())];
        for spec in &self.properties {
            let value = match record.get(&spec.name) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            let param = match value {
                Value::Number(n) if spec.field_type.accepts(value) => {
                    n.as_i64().map(CypherParam::Integer)
                }
                Value::String(s) if spec.field_type.accepts(value) => {
                    Some(CypherParam::Text(s.clone()))
                }
                _ => None,
            };
            let param = param.ok_or_else(|| {
                configuration(format!(
                    "property '{}' holds {} values, got {}",
                    spec.name, spec.field_type, value
                ))
            })?;
            properties.push((spec.name.clone(), param));
        }
        properties.push((POLICY_PROPERTY.to_string(), CypherParam::Text(policy)));

        let mut statement = CypherStatement::new();
        let id = statement.add_param("id", id);
        let props = statement.add_param("props", CypherParam::Map(properties));
        statement.text = format!(
            "MERGE (n:{} {{{}: {}}}) SET n = {}",
            quote(&self.label),
            ID_PROPERTY,
            id,
            props
        );
        Ok(statement)
    }

    fn property(&self, name: &str) -> Option<&FieldSpec> {
        self.properties.iter().find(|spec| spec.name == name)
    }

    fn require_property(&self, name: &str) -> BackendResult<()> {
        match self.property(name) {
            Some(_) => Ok(()),
            None => Err(configuration(format!(
                "label '{}' has no property '{}'",
                self.label, name
            ))),
        }
    }
}

/// Returns the result column of the projected property at `index`.
pub fn column_name(index: usize) -> String {
    format!("p{}", index)
}

fn quote(label: &str) -> String {
    format!("`{}`", label)
}

fn configuration(message: String) -> BackendError {
    BackendError::Configuration {
        backend_name: BACKEND_NAME.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryBuilder, QueryIntent};
    use crate::types::FieldType;
    use crate::validation::InputValidator;
    use serde_json::json;

    fn layout() -> NodeLayout {
        let pattern = Regex::new(LABEL_PATTERN).unwrap();
        NodeLayout::new("Employee", &RecordSchema::employees(), &pattern).unwrap()
    }

    fn query(field: &str, raw: &str, field_type: FieldType) -> BackendQuery {
        let schema = RecordSchema::employees();
        let value = InputValidator::default().validate(raw, field_type).unwrap();
        QueryBuilder::new(&schema)
            .build(&QueryIntent::equals(field, value))
            .unwrap()
    }

    #[test]
    fn test_match_binds_field_and_value() {
        let (statement, projected) = layout()
            .match_by_property(&query("name", "Alice", FieldType::Alpha))
            .unwrap();

        assert_eq!(
            statement.text,
            "MATCH (n:`Employee`) WHERE n[$field] = $value \
             RETURN n.id AS id, n[$p0] AS p0, n[$p1] AS p1, n[$p2] AS p2, n.accessPolicy AS policy \
             ORDER BY id"
        );
        assert_eq!(
            statement.param("field"),
            Some(&CypherParam::Text("name".to_string()))
        );
        assert_eq!(
            statement.param("value"),
            Some(&CypherParam::Text("Alice".to_string()))
        );
        assert_eq!(
            statement.param("p1"),
            Some(&CypherParam::Text("salary".to_string()))
        );
        assert_eq!(projected.len(), 3);
    }

    #[test]
    fn test_value_never_appears_in_cypher() {
        for (field, raw, field_type) in [
            ("name", "Robert", FieldType::Alpha),
            ("department", "IT OR 1 - 1", FieldType::Label),
            ("salary", "100000", FieldType::Integer),
        ] {
            let (statement, _) = layout()
                .match_by_property(&query(field, raw, field_type))
                .unwrap();
            assert!(!statement.text.contains(raw), "{}", statement.text);
            assert!(!statement.text.contains(field), "{}", statement.text);
        }
    }

    #[test]
    fn test_integer_value_bound_as_integer() {
        let (statement, _) = layout()
            .match_by_property(&query("salary", "100000", FieldType::Integer))
            .unwrap();
        assert_eq!(statement.param("value"), Some(&CypherParam::Integer(100000)));
    }

    #[test]
    fn test_invalid_label_rejected() {
        let pattern = Regex::new(LABEL_PATTERN).unwrap();
        let schema = RecordSchema::employees();
        for label in ["Employee`) DETACH DELETE n //", "Emp loyee", "1Employee", ""] {
            assert!(matches!(
                NodeLayout::new(label, &schema, &pattern),
                Err(BackendError::Configuration { .. })
            ));
        }
    }

    #[test]
    fn test_reserved_property_collision() {
        let pattern = Regex::new(LABEL_PATTERN).unwrap();
        let schema = RecordSchema::new().with_field("accessPolicy", FieldType::Label);
        assert!(NodeLayout::new("Employee", &schema, &pattern).is_err());
    }

    #[test]
    fn test_merge_statement() {
        let record = Record::from_document(json!({
            "id": 9,
            "name": "Zed",
            "salary": null,
            "department": "Ops",
            "ssn": "123-45-6789",
            "accessPolicy": {"name": {"role": ["hr"]}}
        }))
        .unwrap();

        let statement = layout().merge(&record).unwrap();
        assert_eq!(
            statement.text,
            "MERGE (n:`Employee` {id: $id}) SET n = $props"
        );
        assert!(!statement.text.contains("Zed"));

        let Some(CypherParam::Map(props)) = statement.param("props") else {
            panic!("expected a property map");
        };
        let names: Vec<&str> = props.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "department", "accessPolicy"]);
        assert_eq!(
            props[3].1,
            CypherParam::Text(r#"{"name":{"role":["hr"]}}"#.to_string())
        );
    }

    #[test]
    fn test_merge_rejects_mistyped_property() {
        let record = Record::from_document(json!({
            "id": 10,
            "department": 42,
            "accessPolicy": {}
        }))
        .unwrap();
        assert!(matches!(
            layout().merge(&record),
            Err(BackendError::Configuration { .. })
        ));
    }
}

//! Graph store adapter, backed by Neo4j.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{BoltMap, BoltString, BoltType, ConfigBuilder, Graph, Query, Row};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::statement::{CypherParam, CypherStatement, LABEL_PATTERN, NodeLayout, column_name};
use crate::core::{BackendAdapter, BackendKind, RecordSet};
use crate::error::{BackendError, BackendResult};
use crate::query::BackendQuery;
use crate::types::{AccessPolicy, FieldSpec, FieldType, Record, RecordId, RecordSchema};

const BACKEND_NAME: &str = "neo4j";

/// Configuration for the graph store adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    #[serde(default = "default_uri")]
    pub uri: String,

    /// User name.
    #[serde(default = "default_user")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Database name. The server default is used when unset.
    #[serde(default)]
    pub database: Option<String>,

    /// Label of the nodes holding records.
    #[serde(default = "default_label")]
    pub label: String,

    /// Maximum number of connections in the driver pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-query timeout in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_label() -> String {
    "Employee".to_string()
}

fn default_max_connections() -> usize {
    16
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_query_timeout_ms() -> u64 {
    10000
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            database: None,
            label: default_label(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl GraphStoreConfig {
    /// Creates a configuration for the given server and credentials.
    pub fn new(uri: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            user: user.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Sets the node label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the per-query timeout.
    pub fn with_query_timeout_ms(mut self, timeout: u64) -> Self {
        self.query_timeout_ms = timeout;
        self
    }
}

/// Per-call connection handle of the graph adapter.
///
/// The driver pools Bolt connections internally; the handle shares that
/// pool.
#[derive(Clone)]
pub struct GraphConnection(Graph);

impl Debug for GraphConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConnection").finish_non_exhaustive()
    }
}

/// Adapter for graph stores, backed by Neo4j.
///
/// Records are nodes with one label. The matched property and the value are
/// bound as Cypher parameters; the policy is read from the node's
/// `accessPolicy` property.
pub struct GraphStoreAdapter {
    graph: Graph,
    layout: NodeLayout,
    config: GraphStoreConfig,
    identity: String,
}

impl Debug for GraphStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStoreAdapter")
            .field("identity", &self.identity)
            .field("label", &self.layout.label())
            .finish_non_exhaustive()
    }
}

impl GraphStoreAdapter {
    /// Creates the driver for the configured server.
    pub async fn open(schema: &RecordSchema, config: GraphStoreConfig) -> BackendResult<Self> {
        let pattern = Regex::new(LABEL_PATTERN).map_err(|e| configuration(e.to_string()))?;
        let layout = NodeLayout::new(&config.label, schema, &pattern)?;

        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .max_connections(config.max_connections);
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }
        let driver_config = builder.build().map_err(|e| configuration(e.to_string()))?;

        let timeout_ms = config.connect_timeout_ms;
        let graph = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            Graph::connect(driver_config),
        )
        .await
        .map_err(|_| timeout("connect", timeout_ms))?
        .map_err(|e| BackendError::unavailable(BACKEND_NAME, e.to_string()))?;

        let identity = format!("neo4j:{}#{}", config.uri, config.label);
        Ok(Self {
            graph,
            layout,
            config,
            identity,
        })
    }

    /// Returns the adapter configuration.
    pub fn config(&self) -> &GraphStoreConfig {
        &self.config
    }

    /// Inserts or replaces a record node. This is an administrative
    /// operation used for seeding; the gateway never writes.
    pub async fn insert(&self, record: &Record) -> BackendResult<()> {
        let statement = self.layout.merge(record)?;
        let timeout_ms = self.config.query_timeout_ms;
        tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.graph.run(to_query(&statement)),
        )
        .await
        .map_err(|_| timeout("insert", timeout_ms))??;
        Ok(())
    }

    /// Inserts or replaces several records.
    pub async fn insert_all<'a, I>(&self, records: I) -> BackendResult<usize>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut count = 0;
        for record in records {
            self.insert(record).await?;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl BackendAdapter for GraphStoreAdapter {
    type Connection = GraphConnection;

    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    fn name(&self) -> &str {
        &self.identity
    }

    async fn connect(&self) -> Result<Self::Connection, BackendError> {
        let timeout_ms = self.config.connect_timeout_ms;
        tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.graph.run(neo4rs::query("RETURN 1")),
        )
        .await
        .map_err(|_| timeout("connect", timeout_ms))?
        .map_err(|e| BackendError::unavailable(BACKEND_NAME, e.to_string()))?;
        Ok(GraphConnection(self.graph.clone()))
    }

    async fn query_by_field(
        &self,
        conn: &mut Self::Connection,
        query: &BackendQuery,
    ) -> Result<RecordSet, BackendError> {
        let (statement, projected) = self.layout.match_by_property(query)?;
        tracing::debug!(
            backend = %self.identity,
            cypher = %statement.text,
            params = statement.params.len(),
            "dispatching graph query"
        );

        let fetch = async {
            let mut rows = conn.0.execute(to_query(&statement)).await?;
            let mut records = Vec::new();
            while let Some(row) = rows.next().await? {
                records.push(read_row(&row, &projected)?);
            }
            Ok::<_, BackendError>(records)
        };

        let timeout_ms = self.config.query_timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), fetch)
            .await
            .map_err(|_| timeout("query", timeout_ms))?
            .map(RecordSet::new)
    }

    async fn close(&self, _conn: Self::Connection) -> Result<(), BackendError> {
        // Bolt connections go back to the driver pool after each query
        Ok(())
    }
}

fn to_query(statement: &CypherStatement) -> Query {
    statement
        .params
        .iter()
        .fold(neo4rs::query(&statement.text), |query, (name, param)| {
            query.param(name, bolt_value(param))
        })
}

fn bolt_value(param: &CypherParam) -> BoltType {
    match param {
        CypherParam::Text(s) => BoltType::from(s.as_str()),
        CypherParam::Integer(i) => BoltType::from(*i),
        CypherParam::Map(entries) => {
            let mut map = BoltMap::new();
            for (key, value) in entries {
                map.put(BoltString::from(key.as_str()), bolt_value(value));
            }
            BoltType::Map(map)
        }
    }
}

fn read_row(row: &Row, projected: &[FieldSpec]) -> BackendResult<Record> {
    let id = match row.get::<i64>("id") {
        Ok(i) => RecordId::Int(i),
        Err(_) => RecordId::Text(
            row.get::<String>("id")
                .map_err(|e| protocol(format!("node id: {}", e)))?,
        ),
    };

    let mut fields = Map::new();
    for (index, spec) in projected.iter().enumerate() {
        let column = column_name(index);
        let value = match spec.field_type {
            FieldType::Integer => row
                .get::<Option<i64>>(&column)
                .map(|v| v.map(Value::from)),
            _ => row
                .get::<Option<String>>(&column)
                .map(|v| v.map(Value::String)),
        }
        .map_err(|e| protocol(format!("property '{}': {}", spec.name, e)))?;
        if let Some(value) = value {
            fields.insert(spec.name.clone(), value);
        }
    }

    let policy = match row
        .get::<Option<String>>("policy")
        .map_err(|e| protocol(format!("policy property: {}", e)))?
    {
        Some(text) => serde_json::from_str::<AccessPolicy>(&text).map_err(|e| {
            BackendError::Protocol {
                backend_name: BACKEND_NAME.to_string(),
                message: format!("stored policy is not a policy document: {}", e),
                source: Some(Box::new(e)),
            }
        })?,
        None => AccessPolicy::new(),
    };

    Ok(Record::new(id, fields, policy))
}

fn timeout(operation: &'static str, timeout_ms: u64) -> BackendError {
    BackendError::Timeout {
        backend_name: BACKEND_NAME.to_string(),
        operation,
        timeout_ms,
    }
}

fn protocol(message: String) -> BackendError {
    BackendError::protocol(BACKEND_NAME, message)
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
    use serde_json::json;

    #[test]
    fn test_config_deserialize() {
        let config: GraphStoreConfig = serde_json::from_value(json!({
            "uri": "bolt://graph:7687",
            "password": "secret",
            "label": "Person"
        }))
        .unwrap();
        assert_eq!(config.user, "neo4j");
        assert_eq!(config.label, "Person");
        assert_eq!(config.query_timeout_ms, 10000);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_bolt_values() {
        let param = CypherParam::Map(vec![
            ("id".to_string(), CypherParam::Integer(1)),
            ("name".to_string(), CypherParam::Text("Alice".to_string())),
        ]);
        assert!(matches!(bolt_value(&param), BoltType::Map(_)));
        assert!(matches!(
            bolt_value(&CypherParam::Integer(7)),
            BoltType::Integer(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let mut config = GraphStoreConfig::new("bolt://127.0.0.1:1", "neo4j", "password");
        config.connect_timeout_ms = 500;

        let result = match GraphStoreAdapter::open(&RecordSchema::employees(), config).await {
            Ok(adapter) => adapter.connect().await.map(|_| ()),
            Err(e) => Err(e),
        };
        let err = result.unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {}", err);
    }
}

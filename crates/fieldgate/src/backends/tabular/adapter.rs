//! Tabular store adapter.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use regex::Regex;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::schema;
use super::statement::{Column, IDENTIFIER_PATTERN, SqlParam, TableLayout};
use crate::core::{BackendAdapter, BackendKind, RecordSet};
use crate::error::{BackendError, BackendResult};
use crate::query::BackendQuery;
use crate::types::{ACCESS_POLICY_ATTRIBUTE, ID_ATTRIBUTE, Record, RecordId, RecordSchema};

const BACKEND_NAME: &str = "sqlite";

/// Capability name reported when an unindexed predicate is refused.
pub const FULL_SCAN_CAPABILITY: &str = "full-table-scan";

/// Configuration for the tabular store adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularStoreConfig {
    /// Database file path, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Table holding the records.
    #[serde(default = "default_table")]
    pub table: String,

    /// Columns to index when the schema is initialized.
    #[serde(default)]
    pub indexed_columns: Vec<String>,

    /// Permit predicates on columns without an index.
    ///
    /// When false such queries fail with an unsupported-capability error
    /// instead of silently scanning the whole table.
    #[serde(default)]
    pub allow_full_scan: bool,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquisition timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Per-query timeout in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from(":memory:")
}

fn default_table() -> String {
    "employees".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    5000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_query_timeout_ms() -> u64 {
    10000
}

impl Default for TabularStoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            table: default_table(),
            indexed_columns: Vec::new(),
            allow_full_scan: false,
            max_connections: default_max_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl TabularStoreConfig {
    /// Creates a configuration for the given database file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Sets the table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Adds an indexed column.
    pub fn with_index(mut self, column: impl Into<String>) -> Self {
        self.indexed_columns.push(column.into());
        self
    }

    /// Permits or forbids unindexed predicates.
    pub fn with_full_scan(mut self, allow: bool) -> Self {
        self.allow_full_scan = allow;
        self
    }

    /// Sets the per-query timeout.
    pub fn with_query_timeout_ms(mut self, timeout: u64) -> Self {
        self.query_timeout_ms = timeout;
        self
    }

    fn is_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

/// Per-call connection handle of the tabular adapter.
///
/// The pooled connection returns to the pool when the handle is dropped.
pub struct TabularConnection(Option<PooledConnection<SqliteConnectionManager>>);

impl Debug for TabularConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularConnection")
            .field("held", &self.0.is_some())
            .finish()
    }
}

/// Adapter for fixed-schema tabular stores, backed by SQLite.
///
/// Queries become `SELECT ... WHERE "column" = ?1` statements with the value
/// bound as a parameter. Column names come from the schema given at
/// construction and are checked against [`IDENTIFIER_PATTERN`].
pub struct TabularStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
    layout: TableLayout,
    config: TabularStoreConfig,
    identity: String,
}

impl Debug for TabularStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularStoreAdapter")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TabularStoreAdapter {
    /// Creates an adapter over a fresh in-memory database.
    pub fn in_memory(schema: &RecordSchema) -> BackendResult<Self> {
        Self::with_config(schema, TabularStoreConfig::default())
    }

    /// Creates an adapter with custom configuration and initializes the
    /// table.
    pub fn with_config(schema: &RecordSchema, config: TabularStoreConfig) -> BackendResult<Self> {
        let pattern = Regex::new(IDENTIFIER_PATTERN).map_err(|e| BackendError::Configuration {
            backend_name: BACKEND_NAME.to_string(),
            message: e.to_string(),
        })?;
        let layout = TableLayout::new(&config.table, schema, &pattern)?;

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(&config.path)
            .with_init(move |conn| conn.busy_timeout(busy_timeout));

        // Every connection to ":memory:" is its own database, so the pool
        // holds exactly one connection and never recycles it.
        let builder = if config.is_memory() {
            Pool::builder()
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder()
                .max_size(config.max_connections)
                .min_idle(Some(1))
        };
        let pool = builder
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| BackendError::Unavailable {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })?;

        let identity = format!("sqlite:{}#{}", config.path.display(), config.table);
        let adapter = Self {
            pool,
            layout,
            config,
            identity,
        };
        adapter.init_schema()?;
        Ok(adapter)
    }

    /// Creates the table and configured indexes if they are missing.
    pub fn init_schema(&self) -> BackendResult<()> {
        let conn = self.pool.get()?;
        schema::initialize_schema(&conn, &self.layout, &self.config.indexed_columns)
    }

    /// Returns the adapter configuration.
    pub fn config(&self) -> &TabularStoreConfig {
        &self.config
    }

    /// Checks that the database answers.
    pub async fn health_check(&self) -> BackendResult<()> {
        self.with_blocking_connection(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    /// Inserts or replaces a record. This is an administrative operation
    /// used for seeding; the gateway never writes.
    ///
    /// Every field value must match its column type; mismatches fail with
    /// [`BackendError::Configuration`] and nothing is written.
    pub async fn insert(&self, record: &Record) -> BackendResult<()> {
        let id = match record.id() {
            RecordId::Int(i) => SqlParam::Integer(*i),
            RecordId::Text(s) => SqlParam::Text(s.clone()),
        };
        let policy = serde_json::to_string(record.access_policy()).map_err(|e| {
            BackendError::protocol(BACKEND_NAME, format!("failed to encode policy: {}", e))
        })?;
        let statement = self.layout.upsert(id, record.fields(), policy)?;

        self.with_blocking_connection(move |conn| {
            conn.execute(&statement.sql, statement.param_refs().as_slice())?;
            Ok(())
        })
        .await
    }

    /// Runs `f` on a pooled connection inside the blocking thread pool.
    async fn with_blocking_connection<T, F>(&self, f: F) -> BackendResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> BackendResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&*conn)
        })
        .await
        .map_err(|e| BackendError::unavailable(BACKEND_NAME, e.to_string()))?
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
impl BackendAdapter for TabularStoreAdapter {
    type Connection = TabularConnection;

    fn kind(&self) -> BackendKind {
        BackendKind::Tabular
    }

    fn name(&self) -> &str {
        &self.identity
    }

    async fn connect(&self) -> Result<Self::Connection, BackendError> {
        let pool = self.pool.clone();
        let conn = tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|e| BackendError::unavailable(BACKEND_NAME, e.to_string()))??;
        Ok(TabularConnection(Some(conn)))
    }

    async fn query_by_field(
        &self,
        conn: &mut Self::Connection,
        query: &BackendQuery,
    ) -> Result<RecordSet, BackendError> {
        let (statement, columns) = self.layout.select(query)?;
        let pooled = conn.0.take().ok_or_else(|| {
            BackendError::unavailable(BACKEND_NAME, "connection lost by an earlier timeout")
        })?;
        let interrupt = pooled.get_interrupt_handle();

        let table = self.layout.table().to_string();
        let field = query.field().to_string();
        let allow_full_scan = self.config.allow_full_scan;
        tracing::debug!(
            backend = %self.identity,
            sql = %statement.sql,
            params = statement.params.len(),
            "dispatching tabular query"
        );

        let task = tokio::task::spawn_blocking(move || {
            let result = (|| {
                if !schema::is_indexed(&pooled, &table, &field)? {
                    if !allow_full_scan {
                        return Err(BackendError::UnsupportedCapability {
                            backend_name: BACKEND_NAME.to_string(),
                            capability: format!("{} on column '{}'", FULL_SCAN_CAPABILITY, field),
                        });
                    }
                    tracing::warn!(
                        table = %table,
                        column = %field,
                        "predicate on unindexed column, running full table scan"
                    );
                }
                run_select(&pooled, &statement.sql, &statement.params, &columns)
            })();
            (pooled, result)
        });

        let timeout_ms = self.config.query_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(Ok((pooled, result))) => {
                conn.0 = Some(pooled);
                result.map(RecordSet::new)
            }
            Ok(Err(join_error)) => Err(BackendError::protocol(
                BACKEND_NAME,
                format!("query task failed: {}", join_error),
            )),
            Err(_) => {
                interrupt.interrupt();
                Err(BackendError::Timeout {
                    backend_name: BACKEND_NAME.to_string(),
                    operation: "query",
                    timeout_ms,
                })
            }
        }
    }

    async fn close(&self, conn: Self::Connection) -> Result<(), BackendError> {
        // Connection is automatically returned to pool when dropped
        drop(conn);
        Ok(())
    }
}

fn run_select(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[SqlParam],
    columns: &[Column],
) -> BackendResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
    let mut rows = stmt.query(param_refs.as_slice())?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut document = Map::new();
        document.insert(ID_ATTRIBUTE.to_string(), column_value(row.get_ref(0)?)?);

        for (offset, column) in columns.iter().enumerate() {
            let value = column_value(row.get_ref(offset + 1)?)?;
            if !value.is_null() {
                document.insert(column.name.clone(), value);
            }
        }

        let policy_text: String = row.get(columns.len() + 1)?;
        let policy: Value = serde_json::from_str(&policy_text).map_err(|e| {
            BackendError::Protocol {
                backend_name: BACKEND_NAME.to_string(),
                message: format!("stored policy is not JSON: {}", e),
                source: Some(Box::new(e)),
            }
        })?;
        document.insert(ACCESS_POLICY_ATTRIBUTE.to_string(), policy);

        let record = Record::from_document(Value::Object(document))
            .map_err(|e| e.into_backend(BACKEND_NAME))?;
        records.push(record);
    }
    Ok(records)
}

fn column_value(value: ValueRef<'_>) -> BackendResult<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::from(i)),
        ValueRef::Real(f) => Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| BackendError::protocol(BACKEND_NAME, format!("invalid UTF-8: {}", e))),
        ValueRef::Blob(_) => Err(BackendError::protocol(
            BACKEND_NAME,
            "unexpected BLOB value in record column",
        )),
    }
}

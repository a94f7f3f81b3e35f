//! Document store adapter.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::NativeFilter;
use super::memory::MemoryCollection;
#[cfg(feature = "mongodb")]
use super::mongo::MongoEngine;
use crate::core::{BackendAdapter, BackendKind, RecordSet};
use crate::error::{BackendError, BackendResult};
use crate::query::BackendQuery;
use crate::types::Record;

/// Configuration for the document store adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// MongoDB connection string, e.g. `mongodb://localhost:27017`.
    /// Without one the adapter uses an in-process collection.
    #[serde(default)]
    pub mongodb_uri: Option<String>,

    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,

    /// Collection name.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-query timeout in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_database() -> String {
    "company".to_string()
}

fn default_collection() -> String {
    "employees".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_query_timeout_ms() -> u64 {
    10000
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            mongodb_uri: None,
            database: default_database(),
            collection: default_collection(),
            connect_timeout_ms: default_connect_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl DocumentStoreConfig {
    /// Creates a MongoDB configuration.
    pub fn mongodb(uri: impl Into<String>) -> Self {
        Self {
            mongodb_uri: Some(uri.into()),
            ..Default::default()
        }
    }

    /// Sets the database and collection names.
    pub fn with_collection(
        mut self,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        self.database = database.into();
        self.collection = collection.into();
        self
    }

    /// Sets the per-query timeout.
    pub fn with_query_timeout_ms(mut self, timeout: u64) -> Self {
        self.query_timeout_ms = timeout;
        self
    }
}

#[derive(Debug)]
enum Engine {
    Memory(Arc<MemoryCollection>),
    #[cfg(feature = "mongodb")]
    Mongo(MongoEngine),
}

/// Per-call connection handle of the document adapter.
#[derive(Debug)]
pub enum DocumentConnection {
    /// Handle to an in-process collection.
    Memory(Arc<MemoryCollection>),
    /// Handle to a MongoDB collection.
    #[cfg(feature = "mongodb")]
    Mongo(mongodb::Collection<mongodb::bson::Document>),
}

/// Adapter for flexible-schema document stores.
///
/// Queries become native filter documents (`{field: {"$eq": value}}`) with a
/// projection of the schema fields; the filter is never built as text.
/// Null-valued fields are dropped from returned records, matching the
/// tabular store where a null column and a missing one are the same.
pub struct DocumentStoreAdapter {
    engine: Engine,
    config: DocumentStoreConfig,
    identity: String,
}

impl Debug for DocumentStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStoreAdapter")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentStoreAdapter {
    /// Creates an adapter over an empty in-process collection.
    pub fn in_memory() -> Self {
        Self::with_memory(DocumentStoreConfig::default())
    }

    /// Creates an in-process adapter with the given names and timeouts.
    pub fn with_memory(mut config: DocumentStoreConfig) -> Self {
        config.mongodb_uri = None;
        let identity = format!("memory:{}.{}", config.database, config.collection);
        Self {
            engine: Engine::Memory(Arc::new(MemoryCollection::new())),
            config,
            identity,
        }
    }

    /// Opens an adapter for the configured engine.
    pub async fn open(config: DocumentStoreConfig) -> BackendResult<Self> {
        match config.mongodb_uri.clone() {
            None => Ok(Self::with_memory(config)),
            #[cfg(feature = "mongodb")]
            Some(uri) => {
                let engine = MongoEngine::open(
                    &uri,
                    &config.database,
                    &config.collection,
                    std::time::Duration::from_millis(config.connect_timeout_ms),
                )
                .await?;
                let identity = format!("mongodb:{}.{}", config.database, config.collection);
                Ok(Self {
                    engine: Engine::Mongo(engine),
                    config,
                    identity,
                })
            }
            #[cfg(not(feature = "mongodb"))]
            Some(_) => Err(BackendError::Configuration {
                backend_name: "document".to_string(),
                message: "MongoDB support requires the 'mongodb' feature".to_string(),
            }),
        }
    }

    /// Returns the adapter configuration.
    pub fn config(&self) -> &DocumentStoreConfig {
        &self.config
    }

    /// Inserts or replaces a record. This is an administrative operation
    /// used for seeding; the gateway never writes.
    pub async fn insert(&self, record: &Record) -> BackendResult<()> {
        match &self.engine {
            Engine::Memory(collection) => {
                collection.upsert(record);
                Ok(())
            }
            #[cfg(feature = "mongodb")]
            Engine::Mongo(engine) => engine.upsert(record).await,
        }
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

    fn to_records(&self, documents: Vec<Value>) -> BackendResult<RecordSet> {
        documents
            .into_iter()
            .map(|doc| {
                Record::from_document(doc)
                    .map(Record::without_nulls)
                    .map_err(|e| e.into_backend(&self.identity))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RecordSet::new)
    }
}

#[async_trait]
impl BackendAdapter for DocumentStoreAdapter {
    type Connection = DocumentConnection;

    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn name(&self) -> &str {
        &self.identity
    }

    async fn connect(&self) -> Result<Self::Connection, BackendError> {
        match &self.engine {
            Engine::Memory(collection) => Ok(DocumentConnection::Memory(collection.clone())),
            #[cfg(feature = "mongodb")]
            Engine::Mongo(engine) => {
                let timeout_ms = self.config.connect_timeout_ms;
                tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), engine.ping())
                    .await
                    .map_err(|_| BackendError::Timeout {
                        backend_name: self.identity.clone(),
                        operation: "connect",
                        timeout_ms,
                    })??;
                Ok(DocumentConnection::Mongo(engine.collection()))
            }
        }
    }

    async fn query_by_field(
        &self,
        conn: &mut Self::Connection,
        query: &BackendQuery,
    ) -> Result<RecordSet, BackendError> {
        let filter = NativeFilter::from_query(query);
        tracing::debug!(
            backend = %self.identity,
            filter = %filter.filter_document(),
            "dispatching document query"
        );

        let documents = match conn {
            DocumentConnection::Memory(collection) => collection.find(&filter),
            #[cfg(feature = "mongodb")]
            DocumentConnection::Mongo(collection) => {
                let timeout = std::time::Duration::from_millis(self.config.query_timeout_ms);
                tokio::time::timeout(timeout, MongoEngine::find(collection, &filter, timeout))
                    .await
                    .map_err(|_| BackendError::Timeout {
                        backend_name: self.identity.clone(),
                        operation: "query",
                        timeout_ms: self.config.query_timeout_ms,
                    })??
            }
        };

        self.to_records(documents)
    }

    async fn close(&self, _conn: Self::Connection) -> Result<(), BackendError> {
        // Handles are returned to the engine's pool when dropped
        Ok(())
    }
}

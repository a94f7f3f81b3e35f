//! Backend adapter implementations.
//!
//! - [`document`] - flexible-schema document store (in-process or MongoDB)
//! - [`tabular`] - fixed-schema tabular store on SQLite (`sqlite` feature)
//! - [`graph`] - property graph store on Neo4j (`neo4j` feature)
//!
//! [`AnyBackend`] selects one of them from configuration and dispatches the
//! [`BackendAdapter`] operations to it, so callers never inspect the concrete
//! adapter type at runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{BackendAdapter, BackendKind, RecordSet};
use crate::error::{BackendError, BackendResult};
use crate::query::BackendQuery;
use crate::types::{Record, RecordSchema};

pub mod document;
pub mod graph;
#[cfg(feature = "sqlite")]
pub mod tabular;

use document::{DocumentConnection, DocumentStoreAdapter, DocumentStoreConfig};
#[cfg(feature = "neo4j")]
use graph::{GraphConnection, GraphStoreAdapter, GraphStoreConfig};
#[cfg(feature = "sqlite")]
use tabular::{TabularConnection, TabularStoreAdapter, TabularStoreConfig};

/// Backend selection, as found in configuration files.
///
/// ```json
/// { "kind": "tabular", "path": "records.db", "indexed_columns": ["department"] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendSelection {
    /// Document store.
    Document(DocumentStoreConfig),
    /// Tabular store.
    #[cfg(feature = "sqlite")]
    Tabular(TabularStoreConfig),
    /// Graph store.
    #[cfg(feature = "neo4j")]
    Graph(GraphStoreConfig),
}

impl Default for BackendSelection {
    fn default() -> Self {
        BackendSelection::Document(DocumentStoreConfig::default())
    }
}

/// One of the built-in adapters.
#[derive(Debug)]
pub enum AnyBackend {
    /// Document store adapter.
    Document(DocumentStoreAdapter),
    /// Tabular store adapter.
    #[cfg(feature = "sqlite")]
    Tabular(TabularStoreAdapter),
    /// Graph store adapter.
    #[cfg(feature = "neo4j")]
    Graph(GraphStoreAdapter),
}

/// Connection handle of [`AnyBackend`].
#[derive(Debug)]
pub enum AnyConnection {
    /// Document store connection.
    Document(DocumentConnection),
    /// Tabular store connection.
    #[cfg(feature = "sqlite")]
    Tabular(TabularConnection),
    /// Graph store connection.
    #[cfg(feature = "neo4j")]
    Graph(GraphConnection),
}

impl AnyBackend {
    /// Builds the adapter named by `selection`.
    ///
    /// `schema` fixes the columns of a tabular store and the node properties
    /// of a graph store; document stores ignore it.
    pub async fn open(selection: BackendSelection, schema: &RecordSchema) -> BackendResult<Self> {
        match selection {
            BackendSelection::Document(config) => {
                let _ = schema;
                Ok(AnyBackend::Document(DocumentStoreAdapter::open(config).await?))
            }
            #[cfg(feature = "sqlite")]
            BackendSelection::Tabular(config) => Ok(AnyBackend::Tabular(
                TabularStoreAdapter::with_config(schema, config)?,
            )),
            #[cfg(feature = "neo4j")]
            BackendSelection::Graph(config) => Ok(AnyBackend::Graph(
                GraphStoreAdapter::open(schema, config).await?,
            )),
        }
    }

    /// Inserts or replaces a record in the underlying store.
    pub async fn insert(&self, record: &Record) -> BackendResult<()> {
        match self {
            AnyBackend::Document(adapter) => adapter.insert(record).await,
            #[cfg(feature = "sqlite")]
            AnyBackend::Tabular(adapter) => adapter.insert(record).await,
            #[cfg(feature = "neo4j")]
            AnyBackend::Graph(adapter) => adapter.insert(record).await,
        }
    }
}

impl From<DocumentStoreAdapter> for AnyBackend {
    fn from(adapter: DocumentStoreAdapter) -> Self {
        AnyBackend::Document(adapter)
    }
}

#[cfg(feature = "sqlite")]
impl From<TabularStoreAdapter> for AnyBackend {
    fn from(adapter: TabularStoreAdapter) -> Self {
        AnyBackend::Tabular(adapter)
    }
}

#[cfg(feature = "neo4j")]
impl From<GraphStoreAdapter> for AnyBackend {
    fn from(adapter: GraphStoreAdapter) -> Self {
        AnyBackend::Graph(adapter)
    }
}

fn mismatched(backend: &AnyBackend) -> BackendError {
    BackendError::protocol(
        backend.name().to_string(),
        "connection handle belongs to a different backend",
    )
}

#[async_trait]
impl BackendAdapter for AnyBackend {
    type Connection = AnyConnection;

    fn kind(&self) -> BackendKind {
        match self {
            AnyBackend::Document(adapter) => adapter.kind(),
            #[cfg(feature = "sqlite")]
            AnyBackend::Tabular(adapter) => adapter.kind(),
            #[cfg(feature = "neo4j")]
            AnyBackend::Graph(adapter) => adapter.kind(),
        }
    }

    fn name(&self) -> &str {
        match self {
            AnyBackend::Document(adapter) => adapter.name(),
            #[cfg(feature = "sqlite")]
            AnyBackend::Tabular(adapter) => adapter.name(),
            #[cfg(feature = "neo4j")]
            AnyBackend::Graph(adapter) => adapter.name(),
        }
    }

    async fn connect(&self) -> Result<Self::Connection, BackendError> {
        match self {
            AnyBackend::Document(adapter) => adapter.connect().await.map(AnyConnection::Document),
            #[cfg(feature = "sqlite")]
            AnyBackend::Tabular(adapter) => adapter.connect().await.map(AnyConnection::Tabular),
            #[cfg(feature = "neo4j")]
            AnyBackend::Graph(adapter) => adapter.connect().await.map(AnyConnection::Graph),
        }
    }

    async fn query_by_field(
        &self,
        conn: &mut Self::Connection,
        query: &BackendQuery,
    ) -> Result<RecordSet, BackendError> {
        match (self, conn) {
            (AnyBackend::Document(adapter), AnyConnection::Document(conn)) => {
                adapter.query_by_field(conn, query).await
            }
            #[cfg(feature = "sqlite")]
            (AnyBackend::Tabular(adapter), AnyConnection::Tabular(conn)) => {
                adapter.query_by_field(conn, query).await
            }
            #[cfg(feature = "neo4j")]
            (AnyBackend::Graph(adapter), AnyConnection::Graph(conn)) => {
                adapter.query_by_field(conn, query).await
            }
            #[allow(unreachable_patterns)]
            _ => Err(mismatched(self)),
        }
    }

    async fn close(&self, conn: Self::Connection) -> Result<(), BackendError> {
        match (self, conn) {
            (AnyBackend::Document(adapter), AnyConnection::Document(conn)) => {
                adapter.close(conn).await
            }
            #[cfg(feature = "sqlite")]
            (AnyBackend::Tabular(adapter), AnyConnection::Tabular(conn)) => {
                adapter.close(conn).await
            }
            #[cfg(feature = "neo4j")]
            (AnyBackend::Graph(adapter), AnyConnection::Graph(conn)) => {
                adapter.close(conn).await
            }
            #[allow(unreachable_patterns)]
            _ => Err(mismatched(self)),
        }
    }
}

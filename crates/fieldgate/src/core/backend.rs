//! Backend adapter abstraction.
//!
//! This module defines the [`BackendAdapter`] trait, the uniform three
//! operation contract (`connect`, `query_by_field`, `close`) that every
//! backing store implements. Adapters receive their configuration when they
//! are constructed; no driver client or session lives outside an adapter.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::query::BackendQuery;
use crate::types::Record;

/// Identifies the structural family of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Flexible-schema document store.
    Document,
    /// Fixed-schema tabular store.
    Tabular,
    /// Property graph store.
    Graph,
    /// Custom or test backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Document => write!(f, "document"),
            BackendKind::Tabular => write!(f, "tabular"),
            BackendKind::Graph => write!(f, "graph"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// The records returned by one `query_by_field` call.
///
/// A record set is finite and owned by the caller. It is produced fresh for
/// every call; no cursor outlives the call that created it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    /// Creates a record set from raw records.
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the set holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// A backing store that can answer field-equality queries.
///
/// # Design
///
/// Each adapter owns its configuration and any pooled resources. A
/// [`Connection`](Self::Connection) is acquired per call by
/// [`connect`](Self::connect) and handed back by [`close`](Self::close); the
/// gateway guarantees `close` runs on every path once `connect` succeeded.
/// Adapters never retry internally.
///
/// # Example
///
/// ```ignore
/// let mut conn = adapter.connect().await?;
/// let result = adapter.query_by_field(&mut conn, &query).await;
/// adapter.close(conn).await?;
/// let records = result?;
/// ```
#[async_trait]
pub trait BackendAdapter: Send + Sync + Debug {
    /// The per-call connection handle.
    type Connection: Send;

    /// Returns the structural family of the backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable identity for audit and logs.
    fn name(&self) -> &str;

    /// Acquires a connection.
    ///
    /// Connectivity failures and timeouts surface as
    /// [`BackendError::Unavailable`] or [`BackendError::Timeout`].
    async fn connect(&self) -> Result<Self::Connection, BackendError>;

    /// Executes a field query and returns the raw matching records.
    async fn query_by_field(
        &self,
        conn: &mut Self::Connection,
        query: &BackendQuery,
    ) -> Result<RecordSet, BackendError>;

    /// Releases a connection.
    async fn close(&self, conn: Self::Connection) -> Result<(), BackendError>;
}

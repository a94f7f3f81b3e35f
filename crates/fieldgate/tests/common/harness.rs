//! Backend constructors and an instrumented adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use fieldgate::backends::document::DocumentStoreAdapter;
use fieldgate::backends::tabular::{TabularStoreAdapter, TabularStoreConfig};
use fieldgate::core::{BackendAdapter, BackendKind, RecordSet};
use fieldgate::error::BackendError;
use fieldgate::query::BackendQuery;
use fieldgate::types::RecordSchema;
use fieldgate::{AccessGateway, MemoryAuditSink};

use super::fixtures::employees;

/// Creates an in-process document store seeded with the fixtures.
pub async fn document_backend() -> DocumentStoreAdapter {
    let backend = DocumentStoreAdapter::in_memory();
    backend
        .insert_all(&employees())
        .await
        .expect("Failed to seed document store");
    backend
}

/// Creates an in-memory tabular store with every schema column indexed,
/// seeded with the fixtures.
pub async fn tabular_backend() -> TabularStoreAdapter {
    let config = TabularStoreConfig::default()
        .with_index("name")
        .with_index("salary")
        .with_index("department");
    tabular_backend_with(config).await
}

/// Creates a tabular store from `config`, seeded with the fixtures.
pub async fn tabular_backend_with(config: TabularStoreConfig) -> TabularStoreAdapter {
    let backend = TabularStoreAdapter::with_config(&RecordSchema::employees(), config)
        .expect("Failed to create tabular store");
    backend
        .insert_all(&employees())
        .await
        .expect("Failed to seed tabular store");
    backend
}

/// Creates a gateway over the employee schema that records audit events.
pub fn audited_gateway() -> (AccessGateway, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = AccessGateway::new(RecordSchema::employees()).with_audit_sink(sink.clone());
    (gateway, sink)
}

/// Failure injected by [`CountingBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every call succeeds.
    None,
    /// `connect` reports the backend as unreachable.
    Unreachable,
    /// `query_by_field` times out.
    QueryTimeout,
    /// `query_by_field` returns a malformed response.
    Malformed,
}

/// Wraps an adapter and counts every call made through it.
#[derive(Debug)]
pub struct CountingBackend<B> {
    inner: B,
    fault: Fault,
    connects: AtomicUsize,
    queries: AtomicUsize,
    closes: AtomicUsize,
}

impl<B> CountingBackend<B> {
    /// Wraps `inner` without injecting faults.
    pub fn new(inner: B) -> Self {
        Self::with_fault(inner, Fault::None)
    }

    /// Wraps `inner` and injects `fault`.
    pub fn with_fault(inner: B, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            connects: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Number of `connect` calls.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of `query_by_field` calls.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Total number of calls of any kind.
    pub fn calls(&self) -> usize {
        self.connects() + self.queries() + self.closes()
    }
}

#[async_trait]
impl<B: BackendAdapter> BackendAdapter for CountingBackend<B> {
    type Connection = B::Connection;

    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn connect(&self) -> Result<Self::Connection, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::Unreachable {
            return Err(BackendError::unavailable(self.name(), "connection refused"));
        }
        self.inner.connect().await
    }

    async fn query_by_field(
        &self,
        conn: &mut Self::Connection,
        query: &BackendQuery,
    ) -> Result<RecordSet, BackendError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::QueryTimeout => Err(BackendError::Timeout {
                backend_name: self.name().to_string(),
                operation: "query",
                timeout_ms: 10,
            }),
            Fault::Malformed => Err(BackendError::protocol(
                self.name(),
                "unexpected column type BLOB at index 3",
            )),
            _ => self.inner.query_by_field(conn, query).await,
        }
    }

    async fn close(&self, conn: Self::Connection) -> Result<(), BackendError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close(conn).await
    }
}

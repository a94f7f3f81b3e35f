//! Structured audit events.
//!
//! The gateway emits exactly one [`AuditEvent`] per `fetch` call, on success
//! and on every failure path, to an [`AuditSink`]. Storage, rotation and
//! querying of events belong to the sink's owner.
//!
//! The raw query value is never part of an event; only its length is kept.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::core::BackendKind;
use crate::error::{ErrorKind, GatewayError};
use crate::types::Role;

/// Summary of the requested query, without the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentSummary {
    /// Requested field.
    pub field: String,
    /// Requested operator.
    pub operator: String,
    /// Length of the supplied value in characters.
    pub value_length: usize,
}

impl fmt::Display for IntentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} <{} chars>",
            self.field, self.operator, self.value_length
        )
    }
}

/// How a fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum AuditOutcome {
    /// Records were returned (possibly none).
    Success,
    /// The request was refused before reaching the backend.
    Rejected(ErrorKind),
    /// The backend failed.
    Failed(ErrorKind),
}

impl AuditOutcome {
    /// Classifies a gateway error.
    pub fn from_error(error: &GatewayError) -> Self {
        match error.kind() {
            kind @ (ErrorKind::InvalidInput | ErrorKind::UnknownField) => {
                AuditOutcome::Rejected(kind)
            }
            kind => AuditOutcome::Failed(kind),
        }
    }

    /// Returns true for [`AuditOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, AuditOutcome::Success)
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Rejected(kind) => write!(f, "rejected:{}", kind),
            AuditOutcome::Failed(kind) => write!(f, "failed:{}", kind),
        }
    }
}

/// One audit record per fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// When the fetch started.
    pub timestamp: DateTime<Utc>,
    /// Unique identifier of the fetch.
    pub request_id: Uuid,
    /// Role asserted by the caller.
    pub role: Role,
    /// What was asked for.
    pub intent: IntentSummary,
    /// Structural family of the backend.
    pub backend_kind: String,
    /// Identity of the backend.
    pub backend_name: String,
    /// Union of field names returned across all records.
    pub fields_returned: BTreeSet<String>,
    /// Number of records returned.
    pub records_returned: usize,
    /// How the fetch ended.
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    pub(crate) fn begin(
        role: &Role,
        intent: IntentSummary,
        backend_kind: BackendKind,
        backend_name: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
            role: role.clone(),
            intent,
            backend_kind: backend_kind.to_string(),
            backend_name: backend_name.to_string(),
            fields_returned: BTreeSet::new(),
            records_returned: 0,
            outcome: AuditOutcome::Success,
        }
    }
}

/// Receiver of audit events.
pub trait AuditSink: Send + Sync {
    /// Records one event. Must not fail the fetch that produced it.
    fn record(&self, event: &AuditEvent);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn record(&self, event: &AuditEvent) {
        (**self).record(event)
    }
}

/// Emits events through `tracing` under the `fieldgate::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let fields: Vec<&str> = event.fields_returned.iter().map(String::as_str).collect();
        if event.outcome.is_success() {
            tracing::info!(
                target: "fieldgate::audit",
                request_id = %event.request_id,
                role = %event.role,
                intent = %event.intent,
                backend_kind = %event.backend_kind,
                backend = %event.backend_name,
                fields_returned = ?fields,
                records_returned = event.records_returned,
                outcome = %event.outcome,
                "fetch completed"
            );
        } else {
            tracing::warn!(
                target: "fieldgate::audit",
                request_id = %event.request_id,
                role = %event.role,
                intent = %event.intent,
                backend_kind = %event.backend_kind,
                backend = %event.backend_name,
                outcome = %event.outcome,
                "fetch refused"
            );
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().push(event.clone());
    }
}

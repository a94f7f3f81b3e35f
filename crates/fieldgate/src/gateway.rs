//! The enforcement entry point.
//!
//! [`AccessGateway::fetch`] runs the whole pipeline for one request:
//!
//! 1. validate the raw value against the field's declared type
//! 2. build the abstract [`BackendQuery`](crate::query::BackendQuery)
//! 3. connect, query and close through a [`BackendAdapter`]
//! 4. project every returned record for the caller's role
//!
//! Nothing reaches the backend unless steps 1 and 2 succeed. The gateway
//! keeps no state between calls and never retries.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink, IntentSummary, TracingAuditSink};
use crate::core::{BackendAdapter, RecordSet};
use crate::error::{GatewayError, GatewayResult};
use crate::filter::{AccessFilter, FilteredRecord};
use crate::query::{FieldQuery, Operator, QueryBuilder, QueryIntent};
use crate::types::{FieldType, Record, RecordSchema, Role};
use crate::validation::InputValidator;

/// Records returned by a fetch, projected lazily for one role.
///
/// Each item is produced by [`AccessFilter::project`] when it is pulled, so
/// a caller that stops early never projects the rest.
#[derive(Debug)]
pub struct FilteredRecords<'g> {
    records: std::vec::IntoIter<Record>,
    filter: &'g AccessFilter,
    role: Role,
}

impl<'g> FilteredRecords<'g> {
    fn new(records: RecordSet, filter: &'g AccessFilter, role: Role) -> Self {
        Self {
            records: records.into_iter(),
            filter,
            role,
        }
    }

    /// Role the records are projected for.
    pub fn role(&self) -> &Role {
        &self.role
    }
}

impl Iterator for FilteredRecords<'_> {
    type Item = FilteredRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.records
            .next()
            .map(|record| self.filter.project(&record, &self.role))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for FilteredRecords<'_> {}

/// Field-level access-control gateway.
///
/// Cheap to share behind an [`Arc`]; every method takes `&self`.
///
/// # Examples
///
/// ```
/// use fieldgate::backends::document::DocumentStoreAdapter;
/// use fieldgate::gateway::AccessGateway;
/// use fieldgate::query::FieldQuery;
/// use fieldgate::types::{Record, RecordSchema, Role};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let backend = DocumentStoreAdapter::in_memory();
/// backend
///     .insert(&Record::from_document(json!({
///         "id": 1,
///         "name": "Alice",
///         "department": "HR",
///         "accessPolicy": {"name": {"role": ["user"]}, "department": {"role": ["user"]}}
///     }))
///     .unwrap())
///     .await
///     .unwrap();
///
/// let gateway = AccessGateway::new(RecordSchema::employees());
/// let records: Vec<_> = gateway
///     .fetch(&Role::new("user"), &FieldQuery::new("department", "HR"), &backend)
///     .await
///     .unwrap()
///     .collect();
///
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].get("name"), Some(&json!("Alice")));
/// # });
/// ```
#[derive(Clone)]
pub struct AccessGateway {
    schema: RecordSchema,
    validator: InputValidator,
    filter: AccessFilter,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for AccessGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGateway")
            .field("schema", &self.schema)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl AccessGateway {
    /// Creates a gateway over `schema` with the default validator and audit
    /// events emitted through `tracing`.
    pub fn new(schema: RecordSchema) -> Self {
        Self {
            filter: AccessFilter::new(schema.clone()),
            schema,
            validator: InputValidator::default(),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Replaces the input validator.
    pub fn with_validator(mut self, validator: InputValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Replaces the audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Returns the field allow-list.
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Validates and runs an untrusted query for `role`.
    ///
    /// The value is checked against the declared type of the field. A field
    /// outside the schema is checked as a [`FieldType::Label`] first, so
    /// operator-like values are always reported as invalid input.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Validation`] when the value is rejected
    /// - [`GatewayError::Query`] when the field is not in the schema
    /// - [`GatewayError::Backend`] when the backend fails
    ///
    /// The backend is never contacted when one of the first two occurs.
    pub async fn fetch<'g, B>(
        &'g self,
        role: &Role,
        query: &FieldQuery,
        backend: &B,
    ) -> GatewayResult<FilteredRecords<'g>>
    where
        B: BackendAdapter + ?Sized,
    {
        let summary = IntentSummary {
            field: query.field.clone(),
            operator: Operator::Equals.to_string(),
            value_length: query.value.chars().count(),
        };
        let mut event = AuditEvent::begin(role, summary, backend.kind(), backend.name());

        let field_type = self
            .schema
            .field_type(&query.field)
            .unwrap_or(FieldType::Label);
        let result = match self.validator.validate(&query.value, field_type) {
            Ok(value) => {
                let intent = QueryIntent::equals(query.field.clone(), value);
                self.execute(role, &intent, backend).await
            }
            Err(e) => Err(e.into()),
        };

        self.finish(&mut event, role, result)
    }

    /// Runs an already validated intent for `role`.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch), minus validation errors.
    pub async fn fetch_intent<'g, B>(
        &'g self,
        role: &Role,
        intent: QueryIntent,
        backend: &B,
    ) -> GatewayResult<FilteredRecords<'g>>
    where
        B: BackendAdapter + ?Sized,
    {
        let summary = IntentSummary {
            field: intent.field().to_string(),
            operator: intent.operator().to_string(),
            value_length: intent.value().char_len(),
        };
        let mut event = AuditEvent::begin(role, summary, backend.kind(), backend.name());
        let result = self.execute(role, &intent, backend).await;
        self.finish(&mut event, role, result)
    }

    async fn execute<B>(
        &self,
        role: &Role,
        intent: &QueryIntent,
        backend: &B,
    ) -> GatewayResult<RecordSet>
    where
        B: BackendAdapter + ?Sized,
    {
        let query = QueryBuilder::new(&self.schema).build(intent)?;

        tracing::debug!(
            backend = backend.name(),
            field = query.field(),
            role = %role,
            "dispatching query"
        );

        let mut conn = backend.connect().await?;
        let result = backend.query_by_field(&mut conn, &query).await;

        // Close regardless of the query result; a failed close only loses the
        // connection, not the records already read.
        if let Err(e) = backend.close(conn).await {
            tracing::warn!(backend = backend.name(), error = %e, "failed to close connection");
        }

        let records = result?;
        tracing::debug!(
            backend = backend.name(),
            records = records.len(),
            "query completed"
        );
        Ok(records)
    }

    fn finish<'g>(
        &'g self,
        event: &mut AuditEvent,
        role: &Role,
        result: GatewayResult<RecordSet>,
    ) -> GatewayResult<FilteredRecords<'g>> {
        match result {
            Ok(records) => {
                event.records_returned = records.len();
                event.fields_returned = self.fields_returned(&records, role);
                event.outcome = AuditOutcome::Success;
                self.audit.record(event);
                Ok(FilteredRecords::new(records, &self.filter, role.clone()))
            }
            Err(error) => {
                if let GatewayError::Backend(backend_error) = &error
                    && !backend_error.is_unavailable()
                {
                    tracing::error!(error = %backend_error, "backend protocol error");
                }
                event.outcome = AuditOutcome::from_error(&error);
                self.audit.record(event);
                Err(error)
            }
        }
    }

    /// Union of the field names the role will see across `records`.
    fn fields_returned(&self, records: &RecordSet, role: &Role) -> BTreeSet<String> {
        records
            .iter()
            .flat_map(|record| {
                self.filter
                    .visible_fields(record.access_policy(), role)
                    .into_iter()
                    .filter(|field| record.get(field).is_some())
            })
            .collect()
    }
}

//! End-to-end tests of the enforcement pipeline over both adapters.

#![cfg(feature = "sqlite")]

mod common;

use std::collections::BTreeSet;

use serde_json::json;

use common::*;
use fieldgate::backends::document::DocumentStoreAdapter;
use fieldgate::backends::tabular::TabularStoreConfig;
use fieldgate::error::{BackendError, ErrorKind};
use fieldgate::filter::FilteredRecord;
use fieldgate::{AuditOutcome, BackendAdapter, FieldQuery, Record, Role};

async fn fetch_all<B: BackendAdapter>(
    backend: &B,
    role: &str,
    field: &str,
    value: &str,
) -> Vec<FilteredRecord> {
    let (gateway, _) = audited_gateway();
    gateway
        .fetch(&Role::new(role), &FieldQuery::new(field, value), backend)
        .await
        .expect("fetch failed")
        .collect()
}

// ============================================================================
// Projection by role
// ============================================================================

#[tokio::test]
async fn test_user_sees_shared_fields() {
    let backend = document_backend().await;
    let records = fetch_all(&backend, "user", "name", "Alice").await;

    assert_eq!(records.len(), 1);
    assert_projection(&records[0], json!({"name": "Alice", "department": "HR"}));
}

#[tokio::test]
async fn test_hr_sees_everything_permitted() {
    let backend = document_backend().await;
    let records = fetch_all(&backend, "hr", "name", "Alice").await;

    assert_eq!(records.len(), 1);
    assert_projection(
        &records[0],
        json!({"name": "Alice", "salary": 100000, "department": "HR"}),
    );
}

#[tokio::test]
async fn test_unlisted_role_sees_nothing() {
    let backend = document_backend().await;
    let records = fetch_all(&backend, "guest", "name", "Alice").await;

    assert_eq!(records.len(), 1);
    assert!(records[0].is_empty());
}

#[tokio::test]
async fn test_record_without_policy_is_fully_hidden() {
    let backend = tabular_backend().await;
    let records = fetch_all(&backend, "hr", "name", "Dave").await;

    assert_eq!(records.len(), 1);
    assert!(records[0].is_empty());
}

#[tokio::test]
async fn test_policy_differs_per_record() {
    let backend = document_backend().await;
    let records = fetch_all(&backend, "user", "department", "IT").await;

    assert_eq!(records.len(), 2);
    assert_field_names(&records[0], &["name", "department"]);
    assert_field_names(&records[1], &["name"]);

    let finance = fetch_all(&backend, "finance", "department", "IT").await;
    assert_field_names(&finance[0], &[]);
    assert_field_names(&finance[1], &["salary"]);
}

#[tokio::test]
async fn test_policy_never_returned() {
    let document = document_backend().await;
    let tabular = tabular_backend().await;

    for role in ["hr", "user", "guest", "finance"] {
        assert_no_policy(&fetch_all(&document, role, "department", "IT").await);
        assert_no_policy(&fetch_all(&tabular, role, "department", "IT").await);
    }
}

// ============================================================================
// Backend equivalence
// ============================================================================

#[tokio::test]
async fn test_both_adapters_return_same_records() {
    let document = document_backend().await;
    let tabular = tabular_backend().await;

    for role in ["hr", "user", "guest", "finance"] {
        for (field, value) in [
            ("department", "IT"),
            ("department", "HR"),
            ("name", "Carol"),
            ("salary", "85000"),
            ("department", "Sales"),
        ] {
            let from_document = fetch_all(&document, role, field, value).await;
            let from_tabular = fetch_all(&tabular, role, field, value).await;
            assert_eq!(
                from_document, from_tabular,
                "adapters disagree for role={} {}={}",
                role, field, value
            );
        }
    }
}

#[tokio::test]
async fn test_department_it_through_both_adapters() {
    let document = document_backend().await;
    let tabular = tabular_backend().await;

    let ids = |records: &[FilteredRecord]| -> Vec<String> {
        records.iter().map(|r| r.id().to_string()).collect()
    };

    let from_document = fetch_all(&document, "hr", "department", "IT").await;
    let from_tabular = fetch_all(&tabular, "hr", "department", "IT").await;

    assert_eq!(ids(&from_document), vec!["2", "3"]);
    assert_eq!(ids(&from_document), ids(&from_tabular));
}

#[tokio::test]
async fn test_adapters_agree_on_null_and_mistyped_fields() {
    let document = document_backend().await;
    let tabular = tabular_backend().await;

    let zed = Record::from_document(zed()).unwrap();
    document.insert(&zed).await.unwrap();
    tabular.insert(&zed).await.unwrap();

    let from_document = fetch_all(&document, "hr", "name", "Zed").await;
    let from_tabular = fetch_all(&tabular, "hr", "name", "Zed").await;
    assert_eq!(from_document, from_tabular);
    assert_projection(&from_tabular[0], json!({"name": "Zed", "department": "Ops"}));

    // The tabular store refuses a value that does not fit its column; the
    // document store keeps it but a label query never matches a number.
    let yan = Record::from_document(yan()).unwrap();
    document.insert(&yan).await.unwrap();
    let err = tabular.insert(&yan).await.unwrap_err();
    assert!(matches!(err, BackendError::Configuration { .. }));

    let from_document = fetch_all(&document, "hr", "department", "42").await;
    let from_tabular = fetch_all(&tabular, "hr", "department", "42").await;
    assert!(from_document.is_empty());
    assert_eq!(from_document, from_tabular);
}

// ============================================================================
// Rejected input
// ============================================================================

#[tokio::test]
async fn test_operator_object_never_reaches_backend() {
    let backend = CountingBackend::new(document_backend().await);
    let (gateway, sink) = audited_gateway();

    let result = gateway
        .fetch(
            &Role::new("hr"),
            &FieldQuery::new("name", "{\"$ne\": null}"),
            &backend,
        )
        .await;

    assert_error_kind(result, ErrorKind::InvalidInput);
    assert_eq!(backend.calls(), 0);
    assert_eq!(sink.len(), 1);
    assert_eq!(
        sink.events()[0].outcome,
        AuditOutcome::Rejected(ErrorKind::InvalidInput)
    );
}

#[tokio::test]
async fn test_injection_attempts_rejected_before_backend() {
    let backend = CountingBackend::new(tabular_backend().await);
    let (gateway, sink) = audited_gateway();
    let role = Role::new("hr");

    let attempts = [
        ("name", "$where"),
        ("name", "Alice$gt"),
        ("name", "Alice' OR '1'='1"),
        ("name", "[\"Alice\"]"),
        ("department", "HR; DROP TABLE employees"),
        ("salary", "1 OR 1=1"),
        ("salary", "99999999999999999999"),
        ("department", ""),
    ];

    for (field, value) in attempts {
        let result = gateway
            .fetch(&role, &FieldQuery::new(field, value), &backend)
            .await;
        assert_error_kind(result, ErrorKind::InvalidInput);
    }

    assert_eq!(backend.calls(), 0);
    assert_eq!(sink.len(), attempts.len());
}

#[tokio::test]
async fn test_unknown_field_never_reaches_backend() {
    let backend = CountingBackend::new(document_backend().await);
    let (gateway, sink) = audited_gateway();

    let result = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("ssn", "123"), &backend)
        .await;

    let err = assert_error_kind(result, ErrorKind::UnknownField);
    assert_eq!(err.to_string(), "unknown field: ssn");
    assert_eq!(backend.calls(), 0);
    assert_eq!(
        sink.events()[0].outcome,
        AuditOutcome::Rejected(ErrorKind::UnknownField)
    );
}

#[tokio::test]
async fn test_policy_field_is_not_queryable() {
    let backend = CountingBackend::new(document_backend().await);
    let (gateway, _) = audited_gateway();

    let result = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("accessPolicy", "hr"), &backend)
        .await;

    assert_error_kind(result, ErrorKind::UnknownField);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_max_input_length_is_configurable() {
    let backend = CountingBackend::new(document_backend().await);
    let (gateway, _) = audited_gateway();
    let gateway = gateway.with_validator(fieldgate::InputValidator::new(4));

    let result = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("name", "Alice"), &backend)
        .await;
    assert_error_kind(result, ErrorKind::InvalidInput);

    let records = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("name", "Bob"), &backend)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(backend.queries(), 1);
}

// ============================================================================
// Backend failures
// ============================================================================

#[tokio::test]
async fn test_unreachable_backend_is_unavailable() {
    let backend = CountingBackend::with_fault(DocumentStoreAdapter::in_memory(), Fault::Unreachable);
    let (gateway, sink) = audited_gateway();

    let result = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("name", "Alice"), &backend)
        .await;

    let err = assert_error_kind(result, ErrorKind::BackendUnavailable);
    assert!(err.is_retryable());
    assert_eq!(backend.connects(), 1, "no internal retries");
    assert_eq!(backend.queries(), 0);
    assert_eq!(
        sink.events()[0].outcome,
        AuditOutcome::Failed(ErrorKind::BackendUnavailable)
    );
}

#[tokio::test]
async fn test_timeout_is_unavailable_and_connection_closed() {
    let backend = CountingBackend::with_fault(document_backend().await, Fault::QueryTimeout);
    let (gateway, _) = audited_gateway();

    let result = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("name", "Alice"), &backend)
        .await;

    assert_error_kind(result, ErrorKind::BackendUnavailable);
    assert_eq!(backend.queries(), 1);
    assert_eq!(backend.closes(), 1);
}

#[tokio::test]
async fn test_protocol_error_is_opaque() {
    let backend = CountingBackend::with_fault(tabular_backend().await, Fault::Malformed);
    let (gateway, sink) = audited_gateway();

    let result = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("name", "Alice"), &backend)
        .await;

    let err = assert_error_kind(result, ErrorKind::BackendProtocol);
    assert!(!err.is_retryable());
    assert_eq!(err.public_message(), "internal backend error");
    assert!(!err.public_message().contains("BLOB"));
    assert_eq!(backend.closes(), 1);
    assert_eq!(
        sink.events()[0].outcome,
        AuditOutcome::Failed(ErrorKind::BackendProtocol)
    );
}

#[tokio::test]
async fn test_unindexed_predicate_requires_full_scan_flag() {
    let strict = tabular_backend_with(TabularStoreConfig::default().with_index("department")).await;
    let (gateway, _) = audited_gateway();

    let result = gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("name", "Alice"), &strict)
        .await;
    assert_error_kind(result, ErrorKind::BackendProtocol);

    let records = fetch_all(&strict, "hr", "department", "HR").await;
    assert_eq!(records.len(), 1);

    let permissive = tabular_backend_with(
        TabularStoreConfig::default()
            .with_index("department")
            .with_full_scan(true),
    )
    .await;
    let records = fetch_all(&permissive, "hr", "name", "Alice").await;
    assert_eq!(records.len(), 1);
}

// ============================================================================
// Auditing
// ============================================================================

#[tokio::test]
async fn test_one_audit_event_per_fetch() {
    let backend = tabular_backend().await;
    let (gateway, sink) = audited_gateway();
    let role = Role::new("user");

    gateway
        .fetch(&role, &FieldQuery::new("department", "IT"), &backend)
        .await
        .unwrap();
    let _ = gateway
        .fetch(&role, &FieldQuery::new("department", "$in"), &backend)
        .await;
    let _ = gateway
        .fetch(&role, &FieldQuery::new("ssn", "1"), &backend)
        .await;

    let events = sink.events();
    assert_eq!(events.len(), 3);

    let first = &events[0];
    assert!(first.outcome.is_success());
    assert_eq!(first.role, role);
    assert_eq!(first.records_returned, 2);
    assert_eq!(first.backend_kind, "tabular");
    assert_eq!(
        first.fields_returned,
        BTreeSet::from(["department".to_string(), "name".to_string()])
    );
    assert_eq!(first.intent.field, "department");
    assert_eq!(first.intent.value_length, 2);

    let ids: BTreeSet<_> = events.iter().map(|e| e.request_id).collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_audit_event_does_not_carry_value() {
    let backend = document_backend().await;
    let (gateway, sink) = audited_gateway();

    gateway
        .fetch(&Role::new("hr"), &FieldQuery::new("name", "Carol"), &backend)
        .await
        .unwrap();

    let serialized = serde_json::to_string(&sink.events()[0]).unwrap();
    assert!(!serialized.contains("Carol"));
}

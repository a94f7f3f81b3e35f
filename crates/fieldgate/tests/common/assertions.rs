//! Assertion helpers for projected records and gateway errors.

use std::collections::BTreeSet;

use serde_json::Value;

use fieldgate::error::{ErrorKind, GatewayError, GatewayResult};
use fieldgate::filter::FilteredRecord;

/// Asserts that a projection exposes exactly `expected` as its fields.
pub fn assert_projection(record: &FilteredRecord, expected: Value) {
    assert_eq!(
        Value::Object(record.fields().clone()),
        expected,
        "Projection mismatch for record {}",
        record.id()
    );
}

/// Asserts that the field names of a projection are exactly `expected`.
pub fn assert_field_names(record: &FilteredRecord, expected: &[&str]) {
    let actual: BTreeSet<&str> = record.fields().keys().map(String::as_str).collect();
    let expected: BTreeSet<&str> = expected.iter().copied().collect();
    assert_eq!(actual, expected, "Field set mismatch for record {}", record.id());
}

/// Asserts that no projection carries the embedded policy.
pub fn assert_no_policy(records: &[FilteredRecord]) {
    for record in records {
        assert!(
            record.get("accessPolicy").is_none() && record.get("access_policy").is_none(),
            "Record {} leaked its access policy",
            record.id()
        );
    }
}

/// Asserts that a result failed with the given kind.
pub fn assert_error_kind<T: std::fmt::Debug>(result: GatewayResult<T>, kind: ErrorKind) -> GatewayError {
    match result {
        Ok(value) => panic!("Expected {} error, got {:?}", kind, value),
        Err(err) => {
            assert_eq!(err.kind(), kind, "Unexpected error: {}", err);
            err
        }
    }
}

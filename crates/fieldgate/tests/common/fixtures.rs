//! Employee records used across the integration tests.

use serde_json::{Value, json};

use fieldgate::types::Record;

/// The canonical record: salary is hr-only, name and department are shared.
pub fn alice() -> Value {
    json!({
        "id": 1,
        "name": "Alice",
        "salary": 100000,
        "department": "HR",
        "accessPolicy": {
            "salary": {"role": ["hr"]},
            "name": {"role": ["hr", "user"]},
            "department": {"role": ["hr", "user"]}
        }
    })
}

/// Same policy as Alice, in IT.
pub fn bob() -> Value {
    json!({
        "id": 2,
        "name": "Bob",
        "salary": 85000,
        "department": "IT",
        "accessPolicy": {
            "salary": {"role": ["hr"]},
            "name": {"role": ["hr", "user"]},
            "department": {"role": ["hr", "user"]}
        }
    })
}

/// In IT, with a department hidden from users and salary shared with finance.
pub fn carol() -> Value {
    json!({
        "id": 3,
        "name": "Carol",
        "salary": 92000,
        "department": "IT",
        "accessPolicy": {
            "salary": {"role": ["hr", "finance"]},
            "name": {"role": ["hr", "user"]},
            "department": {"role": ["hr"]}
        }
    })
}

/// A record with no policy at all.
pub fn dave() -> Value {
    json!({
        "id": 4,
        "name": "Dave",
        "salary": 70000,
        "department": "Ops"
    })
}

/// A record whose salary is stored as an explicit null.
pub fn zed() -> Value {
    json!({
        "id": 9,
        "name": "Zed",
        "salary": null,
        "department": "Ops",
        "accessPolicy": {
            "salary": {"role": ["hr"]},
            "name": {"role": ["hr", "user"]},
            "department": {"role": ["hr", "user"]}
        }
    })
}

/// A record whose department is a number instead of a label.
pub fn yan() -> Value {
    json!({
        "id": 10,
        "name": "Yan",
        "salary": 50000,
        "department": 42,
        "accessPolicy": {
            "name": {"role": ["hr", "user"]},
            "department": {"role": ["hr", "user"]}
        }
    })
}

/// All fixture records in insertion order.
pub fn employees() -> Vec<Record> {
    [alice(), bob(), carol(), dave()]
        .into_iter()
        .map(|doc| Record::from_document(doc).expect("fixture must be a valid record"))
        .collect()
}

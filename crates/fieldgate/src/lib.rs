//! Fieldgate Field-Level Access Control
//!
//! This crate sits between callers and a record store and enforces per-field
//! read permissions. Every stored record carries an embedded access policy of
//! the form `{ field: { role: [..] } }`; callers see only the fields their
//! role is listed for.
//!
//! # Features
//!
//! - **Injection-safe queries**: untrusted values are validated and bound as
//!   typed parameters, never spliced into query text
//! - **Deny-by-default projection**: fields without an explicit grant are
//!   never returned, and the policy itself never leaves the gateway
//! - **Interchangeable backends**: document, tabular and graph stores behind
//!   one adapter contract, returning identical record sets
//! - **Auditing**: one structured event per request
//!
//! # Backend Features
//!
//! ```toml
//! [dependencies]
//! fieldgate = { version = "0.1", features = ["mongodb"] }
//! ```
//!
//! Available backend features:
//! - `sqlite` (default) - tabular store on SQLite, in-memory or file
//! - `mongodb` - MongoDB engine for the document store
//! - `neo4j` - Neo4j graph store
//!
//! The document store always has its in-process engine.
//!
//! # Architecture
//!
//! - [`types`] - roles, access policies, records and the field schema
//! - [`validation`] - checks untrusted values before they reach a query
//! - [`query`] - query intents and backend-agnostic queries
//! - [`filter`] - per-role projection of records
//! - [`core`] - the backend adapter contract
//! - [`backends`] - document, tabular and graph adapters
//! - [`gateway`] - the enforcement pipeline
//! - [`audit`] - structured audit events
//! - [`error`] - error types for all operations
//!
//! # Quick Start
//!
//! ```
//! use fieldgate::backends::document::DocumentStoreAdapter;
//! use fieldgate::{AccessGateway, FieldQuery, Record, RecordSchema, Role};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let backend = DocumentStoreAdapter::in_memory();
//! backend
//!     .insert(&Record::from_document(json!({
//!         "id": 1,
//!         "name": "Alice",
//!         "salary": 100000,
//!         "department": "HR",
//!         "accessPolicy": {
//!             "salary": {"role": ["hr"]},
//!             "name": {"role": ["hr", "user"]},
//!             "department": {"role": ["hr", "user"]}
//!         }
//!     }))
//!     .unwrap())
//!     .await
//!     .unwrap();
//!
//! let gateway = AccessGateway::new(RecordSchema::employees());
//!
//! let visible: Vec<_> = gateway
//!     .fetch(&Role::new("user"), &FieldQuery::new("name", "Alice"), &backend)
//!     .await
//!     .unwrap()
//!     .collect();
//! assert!(visible[0].get("salary").is_none());
//!
//! let err = gateway
//!     .fetch(&Role::new("user"), &FieldQuery::new("name", "{\"$ne\": null}"), &backend)
//!     .await
//!     .unwrap_err();
//! assert_eq!(err.kind(), fieldgate::ErrorKind::InvalidInput);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod audit;
pub mod backends;
pub mod core;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod query;
pub mod types;
pub mod validation;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use backends::{AnyBackend, BackendSelection};
pub use self::core::{BackendAdapter, BackendKind, RecordSet};
pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use filter::{AccessFilter, FilteredRecord};
pub use gateway::{AccessGateway, FilteredRecords};
pub use query::{FieldQuery, QueryIntent};
pub use types::{AccessPolicy, Record, RecordSchema, Role};
pub use validation::{InputValidator, ValidatedValue};

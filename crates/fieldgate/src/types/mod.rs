//! Core types for the access gateway.
//!
//! - [`Role`] - Opaque caller role
//! - [`AccessPolicy`], [`FieldPolicy`] - Per-field read permissions
//! - [`Record`], [`RecordId`] - Policy-carrying records
//! - [`RecordSchema`], [`FieldSpec`], [`FieldType`] - Field allow-list
//!
//! # Examples
//!
//! ```
//! use fieldgate::types::{Record, RecordSchema, Role};
//! use serde_json::json;
//!
//! let schema = RecordSchema::employees();
//! let record = Record::from_document(json!({
//!     "id": 1,
//!     "name": "Alice",
//!     "salary": 100000,
//!     "accessPolicy": {"salary": {"role": ["hr"]}}
//! }))
//! .unwrap();
//!
//! assert!(schema.contains("salary"));
//! assert!(record.access_policy().allows("salary", &Role::new("hr")));
//! ```

mod policy;
mod record;
mod role;
mod schema;

pub use policy::{AccessPolicy, FieldPolicy};
pub use record::{
    ACCESS_POLICY_ATTRIBUTE, DOCUMENT_ID_ATTRIBUTE, ID_ATTRIBUTE, Record, RecordId,
};
pub use role::Role;
pub use schema::{FieldSpec, FieldType, RecordSchema};

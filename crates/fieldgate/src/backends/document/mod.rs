//! Flexible-schema document store backend.
//!
//! The adapter translates a [`BackendQuery`](crate::query::BackendQuery) into
//! a structured native filter and runs it on one of two engines:
//!
//! - an in-process [`MemoryCollection`] (always available)
//! - MongoDB (requires the `mongodb` feature)
//!
//! # Example
//!
//! ```
//! use fieldgate::backends::document::DocumentStoreAdapter;
//! use fieldgate::core::{BackendAdapter, BackendKind};
//!
//! let adapter = DocumentStoreAdapter::in_memory();
//! assert_eq!(adapter.kind(), BackendKind::Document);
//! ```

mod adapter;
mod filter;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use adapter::{DocumentConnection, DocumentStoreAdapter, DocumentStoreConfig};
pub use filter::{EQ_OPERATOR, NativeFilter};
pub use memory::MemoryCollection;
#[cfg(feature = "mongodb")]
pub use mongo::MongoEngine;

//! Core traits shared by all backends.

mod backend;

pub use backend::{BackendAdapter, BackendKind, RecordSet};

//! Fixed-schema tabular store backend (SQLite).
//!
//! Records are stored one row per record, one column per schema field, with
//! the access policy serialized as JSON next to the data:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "employees" (
//!     "id" PRIMARY KEY,
//!     "name" TEXT,
//!     "salary" INTEGER,
//!     "department" TEXT,
//!     "access_policy" TEXT NOT NULL DEFAULT '{}'
//! );
//! ```
//!
//! A predicate on a column without an index is refused unless
//! `allow_full_scan` is set, so that scanning the whole table is always a
//! visible configuration choice.
//!
//! # Example
//!
//! ```
//! use fieldgate::backends::tabular::{TabularStoreAdapter, TabularStoreConfig};
//! use fieldgate::types::RecordSchema;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TabularStoreConfig::default()
//!     .with_index("department")
//!     .with_full_scan(false);
//! let adapter = TabularStoreAdapter::with_config(&RecordSchema::employees(), config)?;
//! assert!(!adapter.config().allow_full_scan);
//! # Ok(())
//! # }
//! ```

mod adapter;
mod schema;
mod statement;

pub use adapter::{
    FULL_SCAN_CAPABILITY, TabularConnection, TabularStoreAdapter, TabularStoreConfig,
};
pub use statement::{IDENTIFIER_PATTERN, SqlParam, SqlStatement, TableLayout};

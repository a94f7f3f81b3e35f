//! Graph store adapter.
//!
//! Records are nodes carrying their fields and a JSON-encoded
//! `accessPolicy` property. [`NodeLayout`] builds the Cypher statements and
//! is always available; the Neo4j-backed [`GraphStoreAdapter`] needs the
//! `neo4j` feature.

#[cfg(feature = "neo4j")]
mod adapter;
mod statement;

#[cfg(feature = "neo4j")]
pub use adapter::{GraphConnection, GraphStoreAdapter, GraphStoreConfig};
pub use statement::{
    CypherParam, CypherStatement, ID_PROPERTY, LABEL_PATTERN, NodeLayout, POLICY_PROPERTY,
    column_name,
};

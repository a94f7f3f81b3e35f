//! Test infrastructure for the gateway and its backends.
//!
//! Provides the employee fixtures used across the suite, constructors for
//! seeded backends and an instrumented adapter that counts backend calls.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;

pub use assertions::*;
pub use fixtures::*;
pub use harness::*;

//! Test utilities shared by unit and integration tests
//!
//! Fixtures build a seeded in-memory repository; assertions give readable
//! failures for authorization and event checks.

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

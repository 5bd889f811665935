//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`] - Builders for domain primitives: levels, snapshots,
//!   trades, candidates, and a fixed timestamp anchor.

pub mod domain;

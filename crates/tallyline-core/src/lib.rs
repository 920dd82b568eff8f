//! tallyline core: transport-agnostic ingestion primitives and error types.
//!
//! This crate defines the line protocol, metric identities, and the error
//! surface shared by the gateway and its tests. It carries no runtime
//! dependencies so the parser can be reused outside the service.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `TallyError`/`LineError` so a malformed
//! line never crashes the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metric;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, Result, TallyError};
pub use metric::{MetricId, MetricKind};

//! tallyline gateway library entry.
//!
//! This crate wires config, the metric registry, TCP line ingestion, and the
//! HTTP scrape endpoint into one sidecar. It is consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod ingest;
pub mod obs;
pub mod ops;
pub mod router;
pub mod runtime;

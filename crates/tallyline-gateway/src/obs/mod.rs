//! In-process metrics.
//!
//! `metrics` holds the concurrent registry (one atomic cell per identity);
//! `expo` renders a registry snapshot in Prometheus text format for the
//! scrape handler.

pub mod expo;
pub mod metrics;

pub use metrics::{Counter, Gauge, MetricRegistry, Sample, SampleValue, Summary};

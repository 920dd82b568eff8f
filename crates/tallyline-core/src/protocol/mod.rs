//! Ingestion wire format.
//!
//! - `frame`: newline framing over a growable read buffer.
//! - `line`: colon-separated numeric fields checked against a field schema.
//!
//! Both are panic-free: malformed input surfaces as `LineError` so one bad
//! producer cannot crash the connection handling it.

pub mod frame;
pub mod line;

//! Top-level facade crate for tallyline.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use tallyline_core::*;
}

pub mod gateway {
    pub use tallyline_gateway::*;
}

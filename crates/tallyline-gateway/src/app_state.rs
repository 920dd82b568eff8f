//! Shared application state for the tallyline gateway.
//!
//! Holds the single registry instance for the process. Listeners receive the
//! same `Arc<MetricRegistry>` at startup; the HTTP handlers reach it through
//! this state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::obs::{expo, MetricRegistry};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    registry: Arc<MetricRegistry>,
    draining: AtomicBool,
}

impl AppState {
    pub fn new(cfg: GatewayConfig, registry: Arc<MetricRegistry>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                draining: AtomicBool::new(false),
            }),
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<MetricRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Snapshot the registry and render it for a scrape.
    pub fn render_metrics(&self) -> String {
        expo::render(&self.inner.registry.snapshot())
    }
}

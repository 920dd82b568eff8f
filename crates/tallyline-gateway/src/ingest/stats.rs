//! Listener self-observability, registered in the same registry as the
//! ingested metrics and labelled with the listener name.

use tallyline_core::error::Result;
use tallyline_core::MetricId;

use crate::obs::{Counter, Gauge, MetricRegistry, Summary};

#[derive(Debug)]
pub struct IngestStats {
    pub accepted: Counter,
    pub active: Gauge,
    pub parse_failures: Counter,
    pub accept_failures: Counter,
    /// Lines applied per connection, recorded when the connection closes.
    pub connection_lines: Summary,
}

impl IngestStats {
    pub fn register(listener: &str, registry: &MetricRegistry) -> Result<Self> {
        let id = |name: &str| MetricId::bare(name)?.with_label("listener", listener);
        Ok(Self {
            accepted: registry.register_counter(id("tallyline_connections_accepted_total")?)?,
            active: registry.register_gauge(id("tallyline_connections_active")?)?,
            parse_failures: registry.register_counter(id("tallyline_parse_failures_total")?)?,
            accept_failures: registry.register_counter(id("tallyline_accept_failures_total")?)?,
            connection_lines: registry.register_summary(id("tallyline_connection_lines")?)?,
        })
    }
}

/// Keeps `tallyline_connections_active` in step with live connections; the
/// decrement runs on every exit path of the worker.
pub(crate) struct ActiveGuard<'a> {
    gauge: &'a Gauge,
}

impl<'a> ActiveGuard<'a> {
    pub(crate) fn enter(gauge: &'a Gauge) -> Self {
        gauge.increment();
        Self { gauge }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.gauge.decrement();
    }
}

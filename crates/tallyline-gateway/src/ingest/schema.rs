//! Compiled line schema: positional fields bound to registered gauges and
//! summaries.

use bytes::Bytes;

use tallyline_core::error::Result;
use tallyline_core::protocol::line::FieldKind;
use tallyline_core::MetricId;

use crate::config::{FieldTarget, IngestMode, ListenerConfig};
use crate::obs::{Counter, Gauge, MetricRegistry, Summary};

#[derive(Debug)]
enum FieldSink {
    Gauge(Gauge),
    Summary(Summary),
}

/// Per-listener mapping from line fields to metric handles, plus the counter of
/// applied lines. Built once before the listener binds and shared by all of
/// its connections.
#[derive(Debug)]
pub struct LineSchema {
    listener: String,
    kinds: Vec<FieldKind>,
    sinks: Vec<FieldSink>,
    applied: Counter,
    mode: IngestMode,
    ack: Bytes,
}

impl LineSchema {
    /// Register every field metric and the line counter.
    ///
    /// Fails with a registration error on an invalid identity or a name
    /// already registered with another kind.
    pub fn compile(cfg: &ListenerConfig, registry: &MetricRegistry) -> Result<Self> {
        let id = |name: &str| MetricId::new(name, cfg.labels.clone());

        let mut kinds = Vec::with_capacity(cfg.fields.len());
        let mut sinks = Vec::with_capacity(cfg.fields.len());
        for f in &cfg.fields {
            kinds.push(f.kind);
            sinks.push(match f.target()? {
                FieldTarget::Gauge(name) => FieldSink::Gauge(registry.register_gauge(id(name)?)?),
                FieldTarget::Summary(name) => {
                    FieldSink::Summary(registry.register_summary(id(name)?)?)
                }
            });
        }
        let applied = registry.register_counter(id(&cfg.counter)?)?;

        let mut ack = cfg.ack.clone().into_bytes();
        ack.push(b'\n');

        Ok(Self {
            listener: cfg.name.clone(),
            kinds,
            sinks,
            applied,
            mode: cfg.mode,
            ack: Bytes::from(ack),
        })
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }

    pub fn kinds(&self) -> &[FieldKind] {
        &self.kinds
    }

    pub fn mode(&self) -> IngestMode {
        self.mode
    }

    /// Acknowledgement written per line in echo-ack mode (terminator included).
    pub fn ack(&self) -> &Bytes {
        &self.ack
    }

    /// Apply one parsed line: field metrics first, then the line counter.
    pub fn apply(&self, values: &[f64]) {
        for (sink, v) in self.sinks.iter().zip(values) {
            match sink {
                FieldSink::Gauge(g) => g.set(*v),
                FieldSink::Summary(s) => s.record(*v),
            }
        }
        self.applied.increment(1);
    }
}

//! TCP line ingestion.
//!
//! Each configured listener compiles its line schema against the shared
//! registry, binds its address, and runs an accept loop that spawns one
//! `IngestConnection` per producer.

pub mod connection;
pub mod listener;
pub mod schema;
pub mod stats;

use std::sync::Arc;

use tallyline_core::error::Result;

use crate::config::ListenerConfig;
use crate::obs::MetricRegistry;

pub use connection::{ConnSummary, IngestConnection};
pub use listener::{IngestListener, ListenerHandle};
pub use schema::LineSchema;
pub use stats::IngestStats;

/// Compiled listener, ready to bind.
pub struct PreparedListener {
    pub cfg: ListenerConfig,
    pub schema: Arc<LineSchema>,
    pub stats: Arc<IngestStats>,
}

/// Register every listener's metrics. Runs before any socket is bound so
/// registration errors abort startup first.
pub fn prepare(
    listeners: &[ListenerConfig],
    registry: &MetricRegistry,
) -> Result<Vec<PreparedListener>> {
    listeners
        .iter()
        .map(|cfg| {
            Ok(PreparedListener {
                schema: Arc::new(LineSchema::compile(cfg, registry)?),
                stats: Arc::new(IngestStats::register(&cfg.name, registry)?),
                cfg: cfg.clone(),
            })
        })
        .collect()
}

/// Bind every prepared listener, then start their accept loops.
///
/// All binds happen before any loop starts; the first bind error is returned
/// and nothing is left running.
pub async fn start(prepared: Vec<PreparedListener>) -> Result<Vec<ListenerHandle>> {
    let mut bound = Vec::with_capacity(prepared.len());
    for p in prepared {
        let addr = p.cfg.listen_addr()?;
        bound.push(IngestListener::bind(addr, p.schema, p.stats).await?);
    }
    Ok(bound.into_iter().map(IngestListener::spawn).collect())
}

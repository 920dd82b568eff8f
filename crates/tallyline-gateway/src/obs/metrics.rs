//! Process-wide metric registry.
//!
//! Every identity owns one atomic cell. Writers hold a cheap `Arc` handle to
//! their cell and never touch the map after registration, so updates to one
//! metric never contend with another. Gauges store `f64` bits in an
//! `AtomicU64`; counters store the count directly.
//!
//! A metric name is one exposition family with one kind. Registering a name
//! again with another kind, under any label set, is rejected, as is a name
//! that would clash with a summary's `_count`/`_sum` series.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use tallyline_core::error::{Result, TallyError};
use tallyline_core::{MetricId, MetricKind};

/// Series suffixes a summary family exposes next to its name.
const SUMMARY_SUFFIXES: [&str; 2] = ["_count", "_sum"];

#[derive(Debug)]
struct Cell {
    kind: MetricKind,
    /// Counter value, gauge bits, or summary observation count.
    bits: AtomicU64,
    /// Summary sum as `f64` bits; unused by the other kinds.
    sum: AtomicU64,
}

impl Cell {
    fn new(kind: MetricKind) -> Self {
        let init = match kind {
            MetricKind::Counter | MetricKind::Summary => 0,
            MetricKind::Gauge => 0f64.to_bits(),
        };
        Self {
            kind,
            bits: AtomicU64::new(init),
            sum: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn read(&self) -> SampleValue {
        let bits = self.bits.load(Ordering::Acquire);
        match self.kind {
            MetricKind::Counter => SampleValue::Counter(bits),
            MetricKind::Gauge => SampleValue::Gauge(f64::from_bits(bits)),
            MetricKind::Summary => SampleValue::Summary {
                count: bits,
                sum: f64::from_bits(self.sum.load(Ordering::Acquire)),
            },
        }
    }
}

fn add_f64(cell: &AtomicU64, delta: f64) {
    let _ = cell.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
        Some((f64::from_bits(curr) + delta).to_bits())
    });
}

/// Handle to a registered gauge.
#[derive(Debug, Clone)]
pub struct Gauge {
    cell: Arc<Cell>,
}

impl Gauge {
    /// Overwrite the value (last write wins).
    pub fn set(&self, value: f64) {
        self.cell.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Add a signed delta.
    pub fn add(&self, delta: f64) {
        add_f64(&self.cell.bits, delta);
    }

    pub fn increment(&self) {
        self.add(1.0);
    }

    pub fn decrement(&self) {
        self.add(-1.0);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.cell.bits.load(Ordering::Acquire))
    }
}

/// Handle to a registered counter.
#[derive(Debug, Clone)]
pub struct Counter {
    cell: Arc<Cell>,
}

impl Counter {
    /// Atomic add.
    pub fn increment(&self, delta: u64) {
        self.cell.bits.fetch_add(delta, Ordering::AcqRel);
    }

    pub fn get(&self) -> u64 {
        self.cell.bits.load(Ordering::Acquire)
    }
}

/// Handle to a registered summary (distribution of observations).
///
/// Count and sum are two independent atomics. A snapshot taken while a
/// record is in flight may see the new sum with the old count.
#[derive(Debug, Clone)]
pub struct Summary {
    cell: Arc<Cell>,
}

impl Summary {
    /// Record one observation.
    pub fn record(&self, value: f64) {
        add_f64(&self.cell.sum, value);
        self.cell.bits.fetch_add(1, Ordering::AcqRel);
    }

    pub fn count(&self) -> u64 {
        self.cell.bits.load(Ordering::Acquire)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.cell.sum.load(Ordering::Acquire))
    }
}

/// Value read from one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Counter(u64),
    Gauge(f64),
    Summary { count: u64, sum: f64 },
}

impl SampleValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            SampleValue::Counter(_) => MetricKind::Counter,
            SampleValue::Gauge(_) => MetricKind::Gauge,
            SampleValue::Summary { .. } => MetricKind::Summary,
        }
    }
}

/// One `(identity, kind, value)` row of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: MetricId,
    pub value: SampleValue,
}

impl Sample {
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

#[derive(Debug, Default)]
pub struct MetricRegistry {
    cells: DashMap<MetricId, Arc<Cell>>,
    /// Kind of every registered name. Only registration takes this lock.
    families: Mutex<HashMap<String, MetricKind>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, id: MetricId, kind: MetricKind) -> Result<Arc<Cell>> {
        let mut families = self
            .families
            .lock()
            .map_err(|_| TallyError::Internal("metric family table poisoned".into()))?;

        match families.get(id.name()) {
            Some(existing) if *existing != kind => {
                return Err(TallyError::KindMismatch(format!(
                    "{} is a {}, not a {}",
                    id.name(),
                    existing.as_str(),
                    kind.as_str()
                )));
            }
            Some(_) => {}
            None => {
                check_family_collision(&families, id.name(), kind)?;
                families.insert(id.name().to_string(), kind);
            }
        }

        let entry = self
            .cells
            .entry(id)
            .or_insert_with(|| Arc::new(Cell::new(kind)));
        Ok(Arc::clone(entry.value()))
    }

    /// Register (or look up) a gauge. Registering the same id again returns a
    /// handle to the same cell.
    pub fn register_gauge(&self, id: MetricId) -> Result<Gauge> {
        self.register(id, MetricKind::Gauge).map(|cell| Gauge { cell })
    }

    /// Register (or look up) a counter.
    pub fn register_counter(&self, id: MetricId) -> Result<Counter> {
        self.register(id, MetricKind::Counter).map(|cell| Counter { cell })
    }

    /// Register (or look up) a summary.
    pub fn register_summary(&self, id: MetricId) -> Result<Summary> {
        self.register(id, MetricKind::Summary).map(|cell| Summary { cell })
    }

    /// Current value of one metric, if registered.
    pub fn value_of(&self, id: &MetricId) -> Option<SampleValue> {
        self.cells.get(id).map(|c| c.value().read())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read every metric, sorted by identity.
    ///
    /// Each cell is read atomically; shards are locked one at a time while
    /// iterating, never the whole map, so values of different metrics may be
    /// skewed by concurrent writers.
    pub fn snapshot(&self) -> Vec<Sample> {
        let mut out: Vec<Sample> = self
            .cells
            .iter()
            .map(|r| Sample {
                id: r.key().clone(),
                value: r.value().read(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

/// A new family must not expose a series name another family already owns.
fn check_family_collision(
    families: &HashMap<String, MetricKind>,
    name: &str,
    kind: MetricKind,
) -> Result<()> {
    if kind == MetricKind::Summary {
        for suffix in SUMMARY_SUFFIXES {
            let series = format!("{name}{suffix}");
            if families.contains_key(&series) {
                return Err(TallyError::NameCollision(format!(
                    "summary {name} exposes {series}, already registered"
                )));
            }
        }
    }
    for suffix in SUMMARY_SUFFIXES {
        if let Some(base) = name.strip_suffix(suffix) {
            if families.get(base) == Some(&MetricKind::Summary) {
                return Err(TallyError::NameCollision(format!(
                    "{name} is a series of summary {base}"
                )));
            }
        }
    }
    Ok(())
}

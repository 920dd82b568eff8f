//! Metric identity and kind.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TallyError};

/// Metric kind as exposed to scrapers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonically increasing count.
    Counter,
    /// Latest reported value.
    Gauge,
    /// Observation count and sum (`<name>_count`, `<name>_sum`).
    Summary,
}

impl MetricKind {
    /// Exposition type name.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
        }
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, minus the reserved `__` prefix.
pub fn is_valid_label_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !key.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_label_key(name: &str, key: &str) -> Result<()> {
    if is_valid_label_key(key) {
        Ok(())
    } else {
        Err(TallyError::InvalidIdentity(format!(
            "metric {name}: invalid label key {key:?}"
        )))
    }
}

/// Name plus static label set.
///
/// Labels are kept in a `BTreeMap`, so two ids built from the same pairs in a
/// different order compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    name: String,
    labels: BTreeMap<String, String>,
}

impl MetricId {
    /// Build an id. Fails unless the name and every label key are valid
    /// exposition identifiers.
    pub fn new<I, K, V>(name: impl Into<String>, labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        if !is_valid_metric_name(&name) {
            return Err(TallyError::InvalidIdentity(format!("invalid metric name {name:?}")));
        }

        let mut map = BTreeMap::new();
        for (k, v) in labels {
            let k = k.into();
            check_label_key(&name, &k)?;
            map.insert(k, v.into());
        }

        Ok(Self { name, labels: map })
    }

    /// Id without labels.
    pub fn bare(name: impl Into<String>) -> Result<Self> {
        Self::new(name, std::iter::empty::<(String, String)>())
    }

    /// Copy of this id with one extra label (overrides an existing key).
    pub fn with_label(&self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let key = key.into();
        check_label_key(&self.name, &key)?;
        let mut out = self.clone();
        out.labels.insert(key, value.into());
        Ok(out)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels in key order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.labels.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (k, v)) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v:?}")?;
        }
        f.write_str("}")
    }
}

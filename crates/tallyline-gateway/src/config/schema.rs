use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;

use serde::Deserialize;
use tallyline_core::error::{Result, TallyError};
use tallyline_core::metric::{is_valid_label_key, is_valid_metric_name};
use tallyline_core::protocol::line::FieldKind;

use crate::ops::{HEALTHZ_PATH, READYZ_PATH};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub scrape: ScrapeSection,

    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TallyError::UnsupportedVersion);
        }
        if self.listeners.is_empty() {
            return Err(TallyError::BadConfig("listeners must not be empty".into()));
        }

        let scrape_addr = self.scrape.validate()?;

        let mut names = HashSet::new();
        let mut addrs = HashSet::from([scrape_addr]);
        for l in &self.listeners {
            let addr = l.validate()?;
            if !names.insert(l.name.as_str()) {
                return Err(TallyError::BadConfig(format!(
                    "duplicate listener name: {}",
                    l.name
                )));
            }
            // Port 0 asks the OS for a fresh port, so it never collides.
            if addr.port() != 0 && !addrs.insert(addr) {
                return Err(TallyError::BadConfig(format!(
                    "listener {} reuses address {addr}",
                    l.name
                )));
            }
        }

        Ok(())
    }
}

fn parse_addr(field: &str, raw: &str) -> Result<SocketAddr> {
    raw.parse()
        .map_err(|_| TallyError::BadConfig(format!("{field} must be a valid SocketAddr: {raw}")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrapeSection {
    #[serde(default = "default_scrape_listen")]
    pub listen: String,

    #[serde(default = "default_scrape_path")]
    pub path: String,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            listen: default_scrape_listen(),
            path: default_scrape_path(),
        }
    }
}

impl ScrapeSection {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("scrape.listen", &self.listen)
    }

    pub fn validate(&self) -> Result<SocketAddr> {
        if !self.path.starts_with('/') {
            return Err(TallyError::BadConfig("scrape.path must start with '/'".into()));
        }
        // The path is registered as an axum route; keep route syntax out.
        if self.path.contains([':', '*', '{', '}']) {
            return Err(TallyError::BadConfig(format!(
                "scrape.path must be a literal path: {}",
                self.path
            )));
        }
        if self.path == HEALTHZ_PATH || self.path == READYZ_PATH {
            return Err(TallyError::BadConfig(format!(
                "scrape.path must not shadow {}",
                self.path
            )));
        }
        self.listen_addr()
    }
}

fn default_scrape_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_scrape_path() -> String {
    "/prometheus".into()
}

/// Response policy of an ingestion listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IngestMode {
    /// Nothing is written back to the producer.
    #[default]
    FireAndForget,
    /// One acknowledgement line per request line.
    EchoAck,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerConfig {
    pub name: String,

    #[serde(default = "default_ingest_listen")]
    pub listen: String,

    #[serde(default)]
    pub mode: IngestMode,

    #[serde(default = "default_ack")]
    pub ack: String,

    /// Static labels attached to every metric this listener registers.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Name of the counter of successfully applied lines.
    pub counter: String,

    pub fields: Vec<FieldSpec>,
}

impl ListenerConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr(&format!("listeners[{}].listen", self.name), &self.listen)
    }

    pub fn validate(&self) -> Result<SocketAddr> {
        if self.name.is_empty() {
            return Err(TallyError::BadConfig("listener name must not be empty".into()));
        }
        if self.fields.is_empty() {
            return Err(TallyError::BadConfig(format!(
                "listener {}: fields must not be empty",
                self.name
            )));
        }
        if self.mode == IngestMode::EchoAck && (self.ack.is_empty() || self.ack.contains('\n')) {
            return Err(TallyError::BadConfig(format!(
                "listener {}: ack must be a non-empty single line",
                self.name
            )));
        }

        self.check_metric_name(&self.counter)?;
        for f in &self.fields {
            match f.target()? {
                FieldTarget::Gauge(name) | FieldTarget::Summary(name) => {
                    self.check_metric_name(name)?
                }
            }
        }
        if let Some(key) = self.labels.keys().find(|k| !is_valid_label_key(k)) {
            return Err(TallyError::BadConfig(format!(
                "listener {}: invalid label key {key:?}",
                self.name
            )));
        }

        self.listen_addr()
    }

    fn check_metric_name(&self, name: &str) -> Result<()> {
        if is_valid_metric_name(name) {
            Ok(())
        } else {
            Err(TallyError::BadConfig(format!(
                "listener {}: invalid metric name {name:?}",
                self.name
            )))
        }
    }
}

fn default_ingest_listen() -> String {
    "127.0.0.1:6873".into()
}
fn default_ack() -> String {
    "Server Message".into()
}

/// One positional field of the line schema. Exactly one of `gauge` and
/// `summary` names the metric the field feeds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Gauge set to the field's latest value.
    #[serde(default)]
    pub gauge: Option<String>,

    /// Summary recording every value of the field.
    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub kind: FieldKind,
}

/// Metric fed by one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget<'a> {
    Gauge(&'a str),
    Summary(&'a str),
}

impl FieldSpec {
    pub fn target(&self) -> Result<FieldTarget<'_>> {
        match (&self.gauge, &self.summary) {
            (Some(g), None) => Ok(FieldTarget::Gauge(g)),
            (None, Some(s)) => Ok(FieldTarget::Summary(s)),
            _ => Err(TallyError::BadConfig(
                "field needs exactly one of gauge or summary".into(),
            )),
        }
    }
}

//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use tallyline_core::error::{Result, TallyError};

pub use schema::{FieldSpec, FieldTarget, GatewayConfig, IngestMode, ListenerConfig, ScrapeSection};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TALLYLINE_CONFIG";

/// Config file used when `TALLYLINE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "tallyline.yaml";

/// Built-in config: one loopback producer listener with the prodcons schema.
pub const DEFAULT_CONFIG: &str = r#"
version: 1
scrape:
  listen: "0.0.0.0:8080"
  path: "/prometheus"
listeners:
  - name: "prodcons"
    listen: "127.0.0.1:6873"
    mode: "fire-and-forget"
    labels: { name: "cuong" }
    counter: "tmp_count"
    fields:
      - { gauge: "cur_prod_rate" }
      - { gauge: "cur_prod_count" }
      - { gauge: "cur_cons_count" }
      - { gauge: "cur_queue_size" }
      - { gauge: "queue_size_threshold" }
"#;

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| TallyError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_default() -> Result<GatewayConfig> {
    load_from_str(DEFAULT_CONFIG)
}

/// Load `path`, falling back to the built-in config when the file is absent.
///
/// Returns the config and whether it came from the file.
pub fn load_or_default(path: &str) -> Result<(GatewayConfig, bool)> {
    match fs::read_to_string(path) {
        Ok(s) => load_from_str(&s).map(|cfg| (cfg, true)),
        Err(e) if e.kind() == ErrorKind::NotFound => load_default().map(|cfg| (cfg, false)),
        Err(e) => Err(TallyError::BadConfig(format!(
            "read config failed ({path}): {e}"
        ))),
    }
}

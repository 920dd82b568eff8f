//! Prometheus text exposition (format 0.0.4).
//!
//! Renders a registry snapshot. Samples arrive sorted by identity, so all
//! series of one metric family are contiguous and get a single `# TYPE` line.
//! Names and label keys were validated when the metric was registered and are
//! written as they are.

use std::fmt::Write;

use super::metrics::{Sample, SampleValue};

/// Content type for the scrape response.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn write_float(out: &mut String, v: f64) {
    let _ = if v.is_nan() {
        write!(out, "NaN")
    } else if v == f64::INFINITY {
        write!(out, "+Inf")
    } else if v == f64::NEG_INFINITY {
        write!(out, "-Inf")
    } else {
        // f64 Display is shortest round-trip and drops ".0" on integral values.
        write!(out, "{v}")
    };
}

fn write_series(out: &mut String, name: &str, suffix: &str, labels: &str) {
    out.push_str(name);
    out.push_str(suffix);
    if !labels.is_empty() {
        let _ = write!(out, "{{{labels}}}");
    }
    out.push(' ');
}

/// Render samples in Prometheus text exposition format.
pub fn render(samples: &[Sample]) -> String {
    let mut out = String::new();
    let mut family: Option<&str> = None;

    for s in samples {
        let name = s.id.name();
        if family != Some(name) {
            let _ = writeln!(out, "# TYPE {} {}", name, s.kind().as_str());
            family = Some(name);
        }

        let labels = s
            .id
            .labels()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect::<Vec<_>>()
            .join(",");

        match s.value {
            SampleValue::Counter(v) => {
                write_series(&mut out, name, "", &labels);
                let _ = writeln!(out, "{v}");
            }
            SampleValue::Gauge(v) => {
                write_series(&mut out, name, "", &labels);
                write_float(&mut out, v);
                out.push('\n');
            }
            SampleValue::Summary { count, sum } => {
                write_series(&mut out, name, "_count", &labels);
                let _ = writeln!(out, "{count}");
                write_series(&mut out, name, "_sum", &labels);
                write_float(&mut out, sum);
                out.push('\n');
            }
        }
    }
    out
}

//! Field parsing for one ingested line.
//!
//! A line is `field0:field1:...:fieldN`. Field `i` is parsed according to
//! `fields[i]`; positions past the end of the schema are ignored.

use serde::Deserialize;
use thiserror::Error;

/// Field separator.
pub const FIELD_SEPARATOR: char = ':';

/// Expected numeric type of one positional field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Signed 64-bit integer literal.
    #[default]
    Integer,
    /// Finite decimal literal (integers accepted).
    Decimal,
}

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected at least {expected} fields, got {got}")]
    TooFewFields { expected: usize, got: usize },
    #[error("field {index} is not a valid number: {raw:?}")]
    BadField { index: usize, raw: String },
    #[error("line is not valid utf-8")]
    NotUtf8,
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// Blank line; carries no update.
    Empty,
    /// One value per schema field, in schema order.
    Values(Vec<f64>),
}

/// Strip the line terminator (`\n` or `\r\n`).
fn trim_terminator(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

fn parse_field(index: usize, raw: &str, kind: FieldKind) -> Result<f64, LineError> {
    let bad = || LineError::BadField {
        index,
        raw: raw.to_string(),
    };
    match kind {
        FieldKind::Integer => raw.parse::<i64>().map(|v| v as f64).map_err(|_| bad()),
        FieldKind::Decimal => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(bad()),
        },
    }
}

/// Parse `raw` (terminator optional) against `fields`.
pub fn parse_line(raw: &[u8], fields: &[FieldKind]) -> Result<ParsedLine, LineError> {
    let raw = trim_terminator(raw);
    if raw.is_empty() {
        return Ok(ParsedLine::Empty);
    }

    let text = std::str::from_utf8(raw).map_err(|_| LineError::NotUtf8)?;

    let parts: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
    if parts.len() < fields.len() {
        return Err(LineError::TooFewFields {
            expected: fields.len(),
            got: parts.len(),
        });
    }

    let values = fields
        .iter()
        .zip(parts)
        .enumerate()
        .map(|(i, (kind, part))| parse_field(i, part, *kind))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedLine::Values(values))
}

//! JSON test vector loader for line parsing tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde::Deserialize;

use tallyline_core::protocol::line::FieldKind;

#[derive(Debug, Deserialize)]
pub struct LineVector {
    pub description: String,
    pub schema: Vec<FieldKind>,
    pub line: LineData,
    #[serde(default)]
    pub expect: Option<Expect>,
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expect {
    Empty,
    Values(Vec<f64>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
pub enum LineData {
    Text(String),
    Bytes(Vec<u8>),
}

impl LineData {
    pub fn raw(&self) -> Vec<u8> {
        match self {
            LineData::Text(s) => s.as_bytes().to_vec(),
            LineData::Bytes(b) => b.clone(),
        }
    }
}

pub fn load(name: &str) -> Vec<LineVector> {
    let s = std::fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

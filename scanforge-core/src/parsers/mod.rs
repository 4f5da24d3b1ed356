//! Output parsing strategies shared by the tool definitions

mod json;
mod jsonl;
mod lines;
mod xml;

pub use json::parse_document;
pub use jsonl::parse_jsonl;
pub use lines::{parse_lines, raw_output};
pub use xml::{attr, child, children, parse_xml};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::records::{dedup_records, NormalizedRecord};

/// Native output format of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    LineText,
    JsonLines,
    JsonDocument,
    Xml,
    Raw,
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputShape::LineText => write!(f, "line text"),
            OutputShape::JsonLines => write!(f, "JSON lines"),
            OutputShape::JsonDocument => write!(f, "JSON document"),
            OutputShape::Xml => write!(f, "XML"),
            OutputShape::Raw => write!(f, "raw text"),
        }
    }
}

/// Records plus tool-level summary fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    pub records: Vec<NormalizedRecord>,
    pub metadata: Map<String, Value>,
}

impl ParsedOutput {
    pub fn new(records: Vec<NormalizedRecord>) -> Self {
        Self {
            records,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Drop repeated discoveries (same identity key), keeping the first
    pub fn dedup(mut self) -> Self {
        self.records = dedup_records(self.records);
        self
    }
}

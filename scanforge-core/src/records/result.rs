//! Normalized scan result returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::NormalizedRecord;

/// Outcome class of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Partial,
    Error,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Success => write!(f, "success"),
            ScanStatus::Partial => write!(f, "partial"),
            ScanStatus::Error => write!(f, "error"),
        }
    }
}

/// What was actually executed, for audit and debugging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub invocation_id: String,
    pub argv: Vec<String>,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub timed_out: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub truncated: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Normalized result of one invocation.
///
/// `error` is set iff `status == Error`, and an error result never carries
/// records. Construction goes through [`ScanResult::success`],
/// [`ScanResult::partial`] and [`ScanResult::error`] so these hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    tool: String,
    status: ScanStatus,
    records: Vec<NormalizedRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution: Option<ExecutionSummary>,
}

impl ScanResult {
    pub fn success(tool: impl Into<String>, records: Vec<NormalizedRecord>) -> Self {
        Self::new(tool, ScanStatus::Success, records)
    }

    pub fn partial(
        tool: impl Into<String>,
        records: Vec<NormalizedRecord>,
        warning: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(tool, ScanStatus::Partial, records);
        result.warning = Some(warning.into());
        result
    }

    pub fn error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(tool, ScanStatus::Error, Vec::new());
        result.error = Some(message.into());
        result
    }

    fn new(tool: impl Into<String>, status: ScanStatus, records: Vec<NormalizedRecord>) -> Self {
        Self {
            tool: tool.into(),
            status,
            records,
            warning: None,
            error: None,
            info: None,
            metadata: Map::new(),
            execution: None,
        }
    }

    /// Attach non-fatal diagnostic output (e.g. stderr of a clean run)
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        let info = info.into();
        if !info.is_empty() {
            self.info = Some(info);
        }
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata_map(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn with_execution(mut self, execution: ExecutionSummary) -> Self {
        self.execution = Some(execution);
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn is_error(&self) -> bool {
        self.status == ScanStatus::Error
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<NormalizedRecord> {
        self.records
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn execution(&self) -> Option<&ExecutionSummary> {
        self.execution.as_ref()
    }
}

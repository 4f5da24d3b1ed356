use serde::de::DeserializeOwned;

use crate::error::ScanError;

/// Deserialize a single JSON document, mapping failure to a parse error
pub fn parse_document<T: DeserializeOwned>(tool: &str, text: &str) -> Result<T, ScanError> {
    serde_json::from_str(text.trim()).map_err(|e| ScanError::parse(tool, e.to_string()))
}

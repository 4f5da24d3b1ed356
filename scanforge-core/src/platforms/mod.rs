//! Bug bounty platform REST clients

pub mod bugcrowd;
pub mod hackerone;

pub use bugcrowd::{BugcrowdClient, NewSubmission};
pub use hackerone::{HackerOneClient, NewReport};

use std::path::PathBuf;

use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde_json::Value;

use crate::error::{Error, ScanError};

/// Join path segments onto a base URL, percent-encoding each segment
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> crate::Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::Config(format!("Invalid API base URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("API base URL cannot carry a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// JSON body of a 2xx response; anything else becomes an upstream error
pub(crate) async fn read_json(response: reqwest::Response) -> crate::Result<Value> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "Platform request rejected");
        return Err(ScanError::Upstream {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Multipart form with a JSON `data` field and one `attachments[]` part per file
pub(crate) async fn attachment_form(data: &Value, files: &[PathBuf]) -> crate::Result<Form> {
    let mut form = Form::new().text("data", data.to_string());
    for path in files {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        form = form.part("attachments[]", Part::bytes(bytes).file_name(name));
    }
    Ok(form)
}

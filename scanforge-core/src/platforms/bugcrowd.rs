//! Bugcrowd API

use std::path::PathBuf;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{attachment_form, endpoint, read_json};
use crate::config::BugcrowdConfig;
use crate::error::ScanError;

pub const DEFAULT_BASE_URL: &str = "https://api.bugcrowd.com";

/// Severity given as `3` or `"3"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SeverityLevel {
    Number(i64),
    Text(String),
}

impl Default for SeverityLevel {
    fn default() -> Self {
        SeverityLevel::Number(0)
    }
}

impl SeverityLevel {
    /// 1 (informational) to 5 (critical)
    pub fn level(&self) -> Result<u8, ScanError> {
        let value = match self {
            SeverityLevel::Number(n) => *n,
            SeverityLevel::Text(s) => s.trim().parse().map_err(|_| {
                ScanError::invalid_input("Severity must be a valid integer between 1 and 5.")
            })?,
        };
        match u8::try_from(value) {
            Ok(level @ 1..=5) => Ok(level),
            _ => Err(ScanError::invalid_input(
                "Severity must be between 1 and 5, where 5 is critical.",
            )),
        }
    }
}

/// A vulnerability submission for a program
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSubmission {
    pub program_uuid: String,
    pub title: String,
    pub vulnerability_type: String,
    pub description: String,
    pub severity: SeverityLevel,
    pub steps: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl NewSubmission {
    fn payload(&self, severity: u8) -> Value {
        json!({
            "data": {
                "type": "submission",
                "attributes": {
                    "title": self.title,
                    "vulnerability_type": self.vulnerability_type,
                    "description": self.description,
                    "severity": severity,
                    "steps_to_reproduce": self.steps,
                    "impact": self.impact,
                }
            }
        })
    }
}

/// Client authenticated with `Authorization: Token <token>`
#[derive(Debug, Clone)]
pub struct BugcrowdClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl BugcrowdClient {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: api_token.into(),
        }
    }

    pub fn from_config(config: &BugcrowdConfig) -> Option<Self> {
        let client = Self::new(config.api_token.clone()?);
        Some(match &config.base_url {
            Some(base) => client.with_base_url(base.clone()),
            None => client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(AUTHORIZATION, format!("Token {}", self.api_token))
            .header(ACCEPT, "application/json")
    }

    pub async fn programs(&self) -> crate::Result<Value> {
        let url = endpoint(&self.base_url, &["programs"])?;
        read_json(self.authorize(self.http.get(url)).send().await?).await
    }

    pub async fn program(&self, program_uuid: &str) -> crate::Result<Value> {
        let url = endpoint(&self.base_url, &["programs", program_uuid])?;
        read_json(self.authorize(self.http.get(url)).send().await?).await
    }

    /// Submit a finding; severity is validated before any request is made
    pub async fn create_submission(&self, submission: &NewSubmission) -> crate::Result<Value> {
        let severity = submission.severity.level()?;
        let url = endpoint(
            &self.base_url,
            &["programs", &submission.program_uuid, "submissions"],
        )?;

        let payload = submission.payload(severity);
        let request = self.authorize(self.http.post(url));
        let request = if submission.attachments.is_empty() {
            request.json(&payload)
        } else {
            request.multipart(attachment_form(&payload, &submission.attachments).await?)
        };
        tracing::info!(program = %submission.program_uuid, "Submitting Bugcrowd finding");
        read_json(request.send().await?).await
    }

    pub async fn submission(
        &self,
        program_uuid: &str,
        submission_uuid: &str,
    ) -> crate::Result<Value> {
        let url = endpoint(
            &self.base_url,
            &["programs", program_uuid, "submissions", submission_uuid],
        )?;
        read_json(self.authorize(self.http.get(url)).send().await?).await
    }
}

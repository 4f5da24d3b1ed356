//! HackerOne hacker API

use std::path::PathBuf;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{attachment_form, endpoint, read_json};
use crate::config::HackerOneConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.hackerone.com/v1";

/// A vulnerability report to submit to a program
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReport {
    pub program_handle: String,
    pub title: String,
    /// HackerOne weakness id
    pub vulnerability_type: String,
    /// none, low, medium, high or critical
    pub severity: String,
    pub summary: String,
    pub reproduction_steps: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl NewReport {
    fn payload(&self) -> Value {
        json!({
            "data": {
                "type": "report",
                "attributes": {
                    "team_handle": self.program_handle,
                    "title": self.title,
                    "vulnerability_information": self.summary,
                    "impact": self.impact,
                    "steps_to_reproduce": self.reproduction_steps,
                    "severity_rating": self.severity,
                    "weakness_id": self.vulnerability_type,
                }
            }
        })
    }
}

/// Client authenticated with HTTP Basic (username + API token)
#[derive(Debug, Clone)]
pub struct HackerOneClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
}

impl HackerOneClient {
    pub fn new(username: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            username: username.into(),
            api_token: api_token.into(),
        }
    }

    /// `None` unless both username and token are configured
    pub fn from_config(config: &HackerOneConfig) -> Option<Self> {
        let client = Self::new(config.username.clone()?, config.api_token.clone()?);
        Some(match &config.base_url {
            Some(base) => client.with_base_url(base.clone()),
            None => client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, url: reqwest::Url) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.username, Some(&self.api_token))
            .header(ACCEPT, "application/json")
    }

    /// Programs visible to the hacker, optionally filtered (active, eligible, enrolled)
    pub async fn programs(&self, filter_type: Option<&str>) -> crate::Result<Value> {
        let url = endpoint(&self.base_url, &["hackers", "programs"])?;
        let mut request = self.get(url);
        if let Some(filter) = filter_type.filter(|f| !f.is_empty()) {
            request = request.query(&[("filter[type]", filter)]);
        }
        read_json(request.send().await?).await
    }

    pub async fn program(&self, handle: &str) -> crate::Result<Value> {
        let url = endpoint(&self.base_url, &["hackers", "programs", handle])?;
        read_json(self.get(url).send().await?).await
    }

    /// Submit a report, as multipart when attachments are given
    pub async fn create_report(&self, report: &NewReport) -> crate::Result<Value> {
        let url = endpoint(&self.base_url, &["hackers", "reports"])?;
        let request = self
            .http
            .post(url)
            .basic_auth(&self.username, Some(&self.api_token))
            .header(ACCEPT, "application/json");

        let payload = report.payload();
        let request = if report.attachments.is_empty() {
            request.json(&payload)
        } else {
            request.multipart(attachment_form(&payload, &report.attachments).await?)
        };
        tracing::info!(program = %report.program_handle, "Submitting HackerOne report");
        read_json(request.send().await?).await
    }

    pub async fn report(&self, report_id: &str) -> crate::Result<Value> {
        let url = endpoint(&self.base_url, &["hackers", "reports", report_id])?;
        read_json(self.get(url).send().await?).await
    }
}

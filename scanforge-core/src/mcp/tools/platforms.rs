//! MCP wrappers for the bug bounty platform clients

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ScanError;
use crate::mcp::{McpTool, McpToolResult};
use crate::platforms::{BugcrowdClient, HackerOneClient, NewReport, NewSubmission};
use crate::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookupArgs {
    filter_type: Option<String>,
    program_handle: String,
    report_id: String,
    program_uuid: String,
    submission_uuid: String,
}

fn required<'a>(value: &'a str, what: &str) -> std::result::Result<&'a str, ScanError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ScanError::missing_input(format!("No {} specified.", what)));
    }
    Ok(value)
}

fn string_prop(description: &str) -> Value {
    serde_json::json!({"type": "string", "description": description})
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HackerOneAction {
    Programs,
    ProgramDetails,
    CreateReport,
    ReportStatus,
}

impl HackerOneAction {
    pub const ALL: [HackerOneAction; 4] = [
        HackerOneAction::Programs,
        HackerOneAction::ProgramDetails,
        HackerOneAction::CreateReport,
        HackerOneAction::ReportStatus,
    ];
}

pub struct McpHackerOneTool {
    client: Arc<HackerOneClient>,
    action: HackerOneAction,
}

impl McpHackerOneTool {
    pub fn new(client: Arc<HackerOneClient>, action: HackerOneAction) -> Self {
        Self { client, action }
    }
}

#[async_trait]
impl McpTool for McpHackerOneTool {
    fn name(&self) -> &str {
        match self.action {
            HackerOneAction::Programs => "hackerone_get_programs",
            HackerOneAction::ProgramDetails => "hackerone_get_program_details",
            HackerOneAction::CreateReport => "hackerone_create_report",
            HackerOneAction::ReportStatus => "hackerone_get_report_status",
        }
    }

    fn description(&self) -> &str {
        match self.action {
            HackerOneAction::Programs => "List HackerOne programs available to the configured hacker account.",
            HackerOneAction::ProgramDetails => "Get details, scope and policy of a HackerOne program.",
            HackerOneAction::CreateReport => "Submit a vulnerability report to a HackerOne program.",
            HackerOneAction::ReportStatus => "Get the current state of a submitted HackerOne report.",
        }
    }

    fn input_schema(&self) -> Value {
        match self.action {
            HackerOneAction::Programs => serde_json::json!({
                "type": "object",
                "properties": {
                    "filter_type": {
                        "type": "string",
                        "enum": ["active", "eligible", "enrolled"],
                        "description": "Restrict the listing to one kind of program"
                    }
                }
            }),
            HackerOneAction::ProgramDetails => serde_json::json!({
                "type": "object",
                "properties": {
                    "program_handle": string_prop("Program handle (e.g. \"security\")")
                },
                "required": ["program_handle"]
            }),
            HackerOneAction::CreateReport => serde_json::json!({
                "type": "object",
                "properties": {
                    "program_handle": string_prop("Program handle to report to"),
                    "title": string_prop("Report title"),
                    "vulnerability_type": string_prop("HackerOne weakness id"),
                    "severity": {
                        "type": "string",
                        "enum": ["none", "low", "medium", "high", "critical"],
                        "description": "Severity rating"
                    },
                    "summary": string_prop("Description of the vulnerability"),
                    "reproduction_steps": string_prop("Steps to reproduce"),
                    "impact": string_prop("Impact of the vulnerability"),
                    "attachments": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Paths of files to attach"
                    }
                },
                "required": ["program_handle", "title", "vulnerability_type", "severity", "summary", "reproduction_steps"]
            }),
            HackerOneAction::ReportStatus => serde_json::json!({
                "type": "object",
                "properties": {
                    "report_id": string_prop("Report id")
                },
                "required": ["report_id"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
        let value = match self.action {
            HackerOneAction::CreateReport => {
                let report: NewReport = serde_json::from_value(arguments)?;
                required(&report.program_handle, "program handle")?;
                self.client.create_report(&report).await?
            }
            HackerOneAction::Programs => {
                let args: LookupArgs = serde_json::from_value(arguments)?;
                self.client.programs(args.filter_type.as_deref()).await?
            }
            HackerOneAction::ProgramDetails => {
                let args: LookupArgs = serde_json::from_value(arguments)?;
                self.client
                    .program(required(&args.program_handle, "program handle")?)
                    .await?
            }
            HackerOneAction::ReportStatus => {
                let args: LookupArgs = serde_json::from_value(arguments)?;
                self.client
                    .report(required(&args.report_id, "report id")?)
                    .await?
            }
        };
        McpToolResult::json(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BugcrowdAction {
    Programs,
    ProgramDetails,
    CreateSubmission,
    SubmissionStatus,
}

impl BugcrowdAction {
    pub const ALL: [BugcrowdAction; 4] = [
        BugcrowdAction::Programs,
        BugcrowdAction::ProgramDetails,
        BugcrowdAction::CreateSubmission,
        BugcrowdAction::SubmissionStatus,
    ];
}

pub struct McpBugcrowdTool {
    client: Arc<BugcrowdClient>,
    action: BugcrowdAction,
}

impl McpBugcrowdTool {
    pub fn new(client: Arc<BugcrowdClient>, action: BugcrowdAction) -> Self {
        Self { client, action }
    }
}

#[async_trait]
impl McpTool for McpBugcrowdTool {
    fn name(&self) -> &str {
        match self.action {
            BugcrowdAction::Programs => "bugcrowd_get_programs",
            BugcrowdAction::ProgramDetails => "bugcrowd_get_program_details",
            BugcrowdAction::CreateSubmission => "bugcrowd_create_submission",
            BugcrowdAction::SubmissionStatus => "bugcrowd_get_submission_status",
        }
    }

    fn description(&self) -> &str {
        match self.action {
            BugcrowdAction::Programs => "List Bugcrowd programs available to the configured account.",
            BugcrowdAction::ProgramDetails => "Get details and scope of a Bugcrowd program.",
            BugcrowdAction::CreateSubmission => "Submit a vulnerability to a Bugcrowd program. Severity runs from 1 (informational) to 5 (critical).",
            BugcrowdAction::SubmissionStatus => "Get the current state of a Bugcrowd submission.",
        }
    }

    fn input_schema(&self) -> Value {
        match self.action {
            BugcrowdAction::Programs => serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            BugcrowdAction::ProgramDetails => serde_json::json!({
                "type": "object",
                "properties": {
                    "program_uuid": string_prop("Program UUID")
                },
                "required": ["program_uuid"]
            }),
            BugcrowdAction::CreateSubmission => serde_json::json!({
                "type": "object",
                "properties": {
                    "program_uuid": string_prop("Program UUID to submit to"),
                    "title": string_prop("Submission title"),
                    "vulnerability_type": string_prop("Vulnerability type (e.g. \"xss\")"),
                    "description": string_prop("Description of the vulnerability"),
                    "severity": {
                        "oneOf": [{"type": "integer"}, {"type": "string"}],
                        "description": "Severity from 1 (informational) to 5 (critical)"
                    },
                    "steps": string_prop("Steps to reproduce"),
                    "impact": string_prop("Impact of the vulnerability"),
                    "attachments": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Paths of files to attach"
                    }
                },
                "required": ["program_uuid", "title", "vulnerability_type", "description", "severity", "steps"]
            }),
            BugcrowdAction::SubmissionStatus => serde_json::json!({
                "type": "object",
                "properties": {
                    "program_uuid": string_prop("Program UUID"),
                    "submission_uuid": string_prop("Submission UUID")
                },
                "required": ["program_uuid", "submission_uuid"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
        let value = match self.action {
            BugcrowdAction::CreateSubmission => {
                let submission: NewSubmission = serde_json::from_value(arguments)?;
                required(&submission.program_uuid, "program UUID")?;
                self.client.create_submission(&submission).await?
            }
            BugcrowdAction::Programs => self.client.programs().await?,
            BugcrowdAction::ProgramDetails => {
                let args: LookupArgs = serde_json::from_value(arguments)?;
                self.client
                    .program(required(&args.program_uuid, "program UUID")?)
                    .await?
            }
            BugcrowdAction::SubmissionStatus => {
                let args: LookupArgs = serde_json::from_value(arguments)?;
                let program = required(&args.program_uuid, "program UUID")?;
                let submission = required(&args.submission_uuid, "submission UUID")?;
                self.client.submission(program, submission).await?
            }
        };
        McpToolResult::json(&value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_names_are_distinct() {
        let h1 = Arc::new(HackerOneClient::new("u", "t"));
        let bc = Arc::new(BugcrowdClient::new("t"));
        let mut names: Vec<String> = HackerOneAction::ALL
            .iter()
            .map(|a| McpHackerOneTool::new(Arc::clone(&h1), *a).name().to_string())
            .chain(
                BugcrowdAction::ALL
                    .iter()
                    .map(|a| McpBugcrowdTool::new(Arc::clone(&bc), *a).name().to_string()),
            )
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
    }

    #[tokio::test]
    async fn test_program_details_requires_handle() {
        let tool = McpHackerOneTool::new(
            Arc::new(HackerOneClient::new("u", "t").with_base_url("http://127.0.0.1:9")),
            HackerOneAction::ProgramDetails,
        );
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "No program handle specified.");
    }

    #[tokio::test]
    async fn test_submission_status_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programs/p-1/submissions/s-2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "triaged"})),
            )
            .mount(&server)
            .await;

        let tool = McpBugcrowdTool::new(
            Arc::new(BugcrowdClient::new("t").with_base_url(server.uri())),
            BugcrowdAction::SubmissionStatus,
        );
        let result = tool
            .execute(serde_json::json!({"program_uuid": "p-1", "submission_uuid": "s-2"}))
            .await
            .unwrap();
        assert!(result.text_content().contains("triaged"));
    }
}

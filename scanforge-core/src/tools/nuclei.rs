//! Nuclei template-based vulnerability scanner

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{deserialize_options, deserialize_targets, options_schema, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ConflictRule, ExecutionOutcome, ScratchArtifact, TargetPlacement,
    ToolSpec,
};
use crate::parsers::{parse_jsonl, OutputShape, ParsedOutput};
use crate::records::{NormalizedRecord, Severity, WebFinding};

const OUTPUT_CONFLICTS: &[ConflictRule] = &[
    ConflictRule::exact("-json").ignore_case(),
    ConflictRule::exact("-jsonl").ignore_case(),
    ConflictRule::exact("-j"),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NucleiRequest {
    #[serde(default, alias = "targets", deserialize_with = "deserialize_targets")]
    pub urls: Vec<String>,
    /// Template names, paths, tags or keywords
    #[serde(default, deserialize_with = "deserialize_targets")]
    pub templates: Vec<String>,
    /// Comma separated severity filter, e.g. `high,critical`
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Nuclei;

impl ToolSpec for Nuclei {
    type Request = NucleiRequest;

    fn name(&self) -> &'static str {
        "nuclei"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::JsonLines
    }

    fn timeout(&self, _request: &NucleiRequest) -> Duration {
        Duration::from_secs(600)
    }

    fn command(
        &self,
        request: &NucleiRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        let mut extra = Vec::new();
        if !request.templates.is_empty() {
            extra.extend(["-t".to_string(), request.templates.join(",")]);
        }
        if let Some(severity) = request.severity.as_deref().filter(|s| !s.is_empty()) {
            extra.extend(["-severity".to_string(), severity.to_string()]);
        }

        Ok(ctx
            .command()
            .placement(TargetPlacement::Flag("-u"))
            .target_label("target URLs")
            .targets(request.urls.iter().cloned())
            .target_args(extra)
            .options(request.options.iter().cloned())
            .mandate("-jsonl")
            .conflicts(OUTPUT_CONFLICTS))
    }

    fn parse(
        &self,
        _request: &NucleiRequest,
        outcome: &ExecutionOutcome,
        _artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        Ok(parse_nuclei_jsonl(&outcome.stdout))
    }
}

impl Catalogued for Nuclei {
    fn description(&self) -> &'static str {
        "Template-based vulnerability scanner"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        vec![VariantInfo::new(
            "scan",
            "Run nuclei templates against one or more URLs. Returns one finding per template match with severity and extracted values.",
            json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "oneOf": [
                            {"type": "array", "items": {"type": "string"}},
                            {"type": "string"}
                        ],
                        "description": "URLs to scan"
                    },
                    "templates": {
                        "oneOf": [
                            {"type": "array", "items": {"type": "string"}},
                            {"type": "string"}
                        ],
                        "description": "Templates, paths or tags (e.g. [\"cves\", \"http/technologies/tech-detect.yaml\"])"
                    },
                    "severity": {"type": "string", "description": "Severity filter (e.g. \"high,critical\")"},
                    "options": options_schema("[\"-etags\", \"intrusive\"]")
                },
                "required": ["urls"]
            }),
        )]
    }
}

#[derive(Debug, Deserialize)]
struct NucleiEvent {
    #[serde(rename = "template-id")]
    template_id: String,
    #[serde(default)]
    info: NucleiInfo,
    #[serde(default, rename = "matcher-name")]
    matcher_name: Option<String>,
    #[serde(default, rename = "matched-at")]
    matched_at: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default, rename = "extracted-results")]
    extracted_results: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NucleiInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// One finding per `-jsonl` event; unparseable lines are dropped
pub fn parse_nuclei_jsonl(stdout: &str) -> ParsedOutput {
    let records = parse_jsonl::<NucleiEvent>(stdout)
        .into_iter()
        .map(|event| {
            let severity = Severity::from_label(event.info.severity.as_deref().unwrap_or(""));
            let id = match event.matcher_name.as_deref().filter(|m| !m.is_empty()) {
                Some(matcher) => format!("{}:{}", event.template_id, matcher),
                None => event.template_id.clone(),
            };
            let name = event.info.name.unwrap_or_else(|| event.template_id.clone());
            let mut finding = WebFinding::new("nuclei", id, name, severity)
                .with_extracted(event.extracted_results);
            if let Some(url) = event.matched_at.or(event.host) {
                finding = finding.with_url(url);
            }
            if let Some(description) = event.info.description {
                finding = finding.with_description(description.trim());
            }
            NormalizedRecord::WebFinding(finding)
        })
        .collect();
    let output = ParsedOutput::new(records).dedup();

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in &output.records {
        if let NormalizedRecord::WebFinding(finding) = record {
            *counts.entry(finding.severity.to_string()).or_default() += 1;
        }
    }
    if counts.is_empty() {
        output
    } else {
        output.with_metadata("severity_counts", json!(counts))
    }
}

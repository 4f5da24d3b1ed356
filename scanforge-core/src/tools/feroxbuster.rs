//! Feroxbuster recursive content discovery

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use super::{deserialize_options, options_schema, strip_ansi, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ConflictRule, ExecutionOutcome, ScratchArtifact, TargetPlacement,
    ToolSpec,
};
use crate::parsers::{parse_jsonl, parse_lines, OutputShape, ParsedOutput};
use crate::records::{ContentRecord, NormalizedRecord};

pub const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";
pub const DEFAULT_STATUS_CODES: &str = "200,204,301,302,307,308,401,403,405,500";
const RECURSIVE_EXTENSIONS: &str = "php,html,txt,js,css";

/// `200      GET       10l       20w      300c http://host/path`
#[allow(clippy::expect_used)]
static TEXT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{3})\s+([A-Z]+)\s+(\d+)l\s+(\d+)w\s+(\d+)c\s+(\S+)")
        .expect("Hardcoded feroxbuster text regex pattern should be valid")
});

const OUTPUT_CONFLICTS: &[ConflictRule] = &[
    ConflictRule::exact("-o").with_value(),
    ConflictRule::exact("--output").with_value(),
    ConflictRule::exact("-q"),
    ConflictRule::exact("--silent"),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum FeroxbusterRequest {
    Scan(ContentScan),
    Recursive(RecursiveScan),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentScan {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub wordlist: Option<String>,
    #[serde(default)]
    pub extensions: Option<String>,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub status_codes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecursiveScan {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub wordlist: Option<String>,
    #[serde(default)]
    pub extensions: Option<String>,
    #[serde(default)]
    pub max_depth: Option<u32>,
}

impl FeroxbusterRequest {
    fn url(&self) -> &str {
        match self {
            FeroxbusterRequest::Scan(s) => &s.url,
            FeroxbusterRequest::Recursive(s) => &s.url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeroxLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    content_length: Option<u64>,
    #[serde(default)]
    line_count: Option<u64>,
    #[serde(default)]
    word_count: Option<u64>,
    #[serde(default)]
    wildcard: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Feroxbuster;

impl ToolSpec for Feroxbuster {
    type Request = FeroxbusterRequest;

    fn name(&self) -> &'static str {
        "feroxbuster"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::JsonLines
    }

    fn timeout(&self, _request: &FeroxbusterRequest) -> Duration {
        Duration::from_secs(600)
    }

    fn artifact_suffix(&self, _request: &FeroxbusterRequest) -> Option<&'static str> {
        Some(".jsonl")
    }

    fn command(
        &self,
        request: &FeroxbusterRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        let (wordlist, tuning, options): (String, Vec<String>, Vec<String>) = match request {
            FeroxbusterRequest::Scan(scan) => {
                let mut tuning = vec![
                    "-t".to_string(),
                    scan.threads.unwrap_or(50).to_string(),
                    "-d".to_string(),
                    scan.depth.unwrap_or(4).to_string(),
                    "-s".to_string(),
                    scan.status_codes
                        .clone()
                        .filter(|c| !c.is_empty())
                        .unwrap_or_else(|| DEFAULT_STATUS_CODES.to_string()),
                ];
                if let Some(ext) = scan.extensions.as_deref().filter(|e| !e.is_empty()) {
                    tuning.extend(["-x".to_string(), ext.to_string()]);
                }
                tuning.push("--smart".to_string());
                (
                    ctx.wordlist_or(scan.wordlist.as_deref(), DEFAULT_WORDLIST),
                    tuning,
                    scan.options.clone(),
                )
            }
            FeroxbusterRequest::Recursive(scan) => {
                let tuning = vec![
                    "-t".to_string(),
                    "100".to_string(),
                    "-d".to_string(),
                    scan.max_depth.unwrap_or(3).to_string(),
                    "-x".to_string(),
                    scan.extensions
                        .clone()
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| RECURSIVE_EXTENSIONS.to_string()),
                    "--smart".to_string(),
                    "-s".to_string(),
                    DEFAULT_STATUS_CODES.to_string(),
                    "-C".to_string(),
                    "404".to_string(),
                ];
                (
                    ctx.wordlist_or(scan.wordlist.as_deref(), DEFAULT_WORDLIST),
                    tuning,
                    Vec::new(),
                )
            }
        };

        Ok(ctx
            .command()
            .placement(TargetPlacement::Flag("-u"))
            .target_label("target URL")
            .target(request.url())
            .target_args(["-w".to_string(), wordlist])
            .target_args(tuning)
            .options(options)
            .mandate("--json")
            .mandate("--quiet")
            .mandate_with("-o", ctx.artifact_arg()?)
            .conflicts(OUTPUT_CONFLICTS))
    }

    fn parse(
        &self,
        _request: &FeroxbusterRequest,
        outcome: &ExecutionOutcome,
        artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        let mut records = match artifact.and_then(ScratchArtifact::contents) {
            Some(jsonl) => parse_json_lines(&jsonl),
            None => Vec::new(),
        };
        // stdout carries either JSON (older releases) or the human readable table
        records.extend(parse_json_lines(&outcome.stdout));
        records.extend(parse_text_lines(&outcome.stdout));
        Ok(ParsedOutput::new(records).dedup())
    }
}

impl Catalogued for Feroxbuster {
    fn description(&self) -> &'static str {
        "Fast recursive content discovery"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        vec![
            VariantInfo::new(
                "scan",
                "Content discovery with sensible defaults (50 threads, depth 4, common status codes, smart filtering). Returns discovered URLs with status, size, line and word counts.",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "Target URL"},
                        "wordlist": {"type": "string", "description": "Wordlist path"},
                        "extensions": {"type": "string", "description": "Extensions, comma separated (e.g. php,html,txt)"},
                        "threads": {"type": "integer", "description": "Concurrent threads (default 50)"},
                        "depth": {"type": "integer", "description": "Recursion depth (default 4)"},
                        "status_codes": {"type": "string", "description": "Status codes to report"},
                        "options": options_schema("[\"-k\", \"--rate-limit\", \"100\"]")
                    },
                    "required": ["url"]
                }),
            ),
            VariantInfo::new(
                "recursive",
                "Aggressive recursive scan (100 threads, common web extensions, 404s filtered).",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "Target URL"},
                        "wordlist": {"type": "string", "description": "Wordlist path"},
                        "extensions": {"type": "string", "description": "Extensions (default php,html,txt,js,css)"},
                        "max_depth": {"type": "integer", "description": "Maximum recursion depth (default 3)"}
                    },
                    "required": ["url"]
                }),
            ),
        ]
    }
}

/// Keep `type == "response"` entries; other line types and bad lines are ignored
pub fn parse_json_lines(text: &str) -> Vec<NormalizedRecord> {
    parse_jsonl::<FeroxLine>(text)
        .into_iter()
        .filter(|line| line.kind == "response" && !line.url.is_empty())
        .map(|line| {
            NormalizedRecord::Content(ContentRecord {
                url: line.url,
                status: line.status,
                content_length: line.content_length,
                line_count: line.line_count,
                word_count: line.word_count,
                method: line.method.unwrap_or_else(|| "GET".to_string()),
                wildcard: line.wildcard,
            })
        })
        .collect()
}

fn parse_text_lines(text: &str) -> Vec<NormalizedRecord> {
    let text = strip_ansi(text);
    parse_lines(&text, |line| {
        let caps = TEXT_LINE.captures(line)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
        Some(NormalizedRecord::Content(ContentRecord {
            url: caps.get(6)?.as_str().to_string(),
            status: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            content_length: num(5),
            line_count: num(3),
            word_count: num(4),
            method: caps.get(2)?.as_str().to_string(),
            wildcard: false,
        }))
    })
}

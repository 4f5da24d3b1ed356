//! Gobuster directory and subdomain brute forcing

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
use crate::parsers::{parse_lines, OutputShape, ParsedOutput};
use crate::records::{NormalizedRecord, PathRecord, SubdomainRecord};

pub const DEFAULT_DIR_WORDLIST: &str = "/usr/share/wordlists/dirb/common.txt";
pub const DEFAULT_DNS_WORDLIST: &str =
    "/usr/share/wordlists/SecLists/Discovery/DNS/subdomains-top1million-5000.txt";

#[allow(clippy::expect_used)]
static DIR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\s+\(Status:\s*(\d{3})\)(?:\s*\[Size:\s*(\d+)\])?")
        .expect("Hardcoded gobuster dir regex pattern should be valid")
});

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum GobusterRequest {
    Dir(DirScan),
    Dns(DnsScan),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirScan {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub wordlist: Option<String>,
    /// Comma separated, e.g. `php,html`
    #[serde(default)]
    pub extensions: Option<String>,
    #[serde(default)]
    pub threads: Option<u32>,
    /// Positive status codes, e.g. `200,204,301`
    #[serde(default)]
    pub status_codes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DnsScan {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub wordlist: Option<String>,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Gobuster;

impl ToolSpec for Gobuster {
    type Request = GobusterRequest;

    fn name(&self) -> &'static str {
        "gobuster"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::LineText
    }

    fn timeout(&self, _request: &GobusterRequest) -> Duration {
        Duration::from_secs(600)
    }

    fn artifact_suffix(&self, request: &GobusterRequest) -> Option<&'static str> {
        match request {
            GobusterRequest::Dir(_) => Some(".txt"),
            GobusterRequest::Dns(_) => None,
        }
    }

    fn command(
        &self,
        request: &GobusterRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        match request {
            GobusterRequest::Dir(scan) => {
                let mut extra = vec![
                    "-w".to_string(),
                    ctx.wordlist_or(scan.wordlist.as_deref(), DEFAULT_DIR_WORDLIST),
                ];
                if let Some(ext) = scan.extensions.as_deref().filter(|e| !e.is_empty()) {
                    extra.extend(["-x".to_string(), ext.to_string()]);
                }
                if let Some(threads) = scan.threads {
                    extra.extend(["-t".to_string(), threads.to_string()]);
                }
                if let Some(codes) = scan.status_codes.as_deref().filter(|c| !c.is_empty()) {
                    // -s only works once the default 404 blacklist is cleared
                    extra.extend([
                        "-s".to_string(),
                        codes.to_string(),
                        "-b".to_string(),
                        String::new(),
                    ]);
                }

                Ok(ctx
                    .command()
                    .base(["dir"])
                    .placement(TargetPlacement::Flag("-u"))
                    .target_label("target URL")
                    .target(scan.url.clone())
                    .target_args(extra)
                    .options(scan.options.iter().cloned())
                    .mandate("-q")
                    .mandate_with("-o", ctx.artifact_arg()?)
                    .conflicts(&[
                        ConflictRule::exact("-o").with_value(),
                        ConflictRule::exact("--output").with_value(),
                        ConflictRule::exact("--quiet"),
                    ]))
            }
            GobusterRequest::Dns(scan) => {
                let mut extra = vec![
                    "-w".to_string(),
                    ctx.wordlist_or(scan.wordlist.as_deref(), DEFAULT_DNS_WORDLIST),
                ];
                if let Some(threads) = scan.threads {
                    extra.extend(["-t".to_string(), threads.to_string()]);
                }

                Ok(ctx
                    .command()
                    .base(["dns"])
                    .placement(TargetPlacement::Flag("-d"))
                    .target_label("domain")
                    .target(scan.domain.clone())
                    .target_args(extra)
                    .options(scan.options.iter().cloned())
                    .mandate("-q")
                    .conflicts(&[ConflictRule::exact("--quiet")]))
            }
        }
    }

    fn parse(
        &self,
        request: &GobusterRequest,
        outcome: &ExecutionOutcome,
        artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        match request {
            GobusterRequest::Dir(scan) => {
                let mut records = parse_dir_output(&outcome.stdout, &scan.url);
                if let Some(contents) = artifact.and_then(ScratchArtifact::contents) {
                    records.extend(parse_dir_output(&contents, &scan.url));
                }
                Ok(ParsedOutput::new(records).dedup())
            }
            GobusterRequest::Dns(scan) => {
                Ok(ParsedOutput::new(parse_dns_output(&outcome.stdout, &scan.domain)).dedup())
            }
        }
    }
}

impl Catalogued for Gobuster {
    fn description(&self) -> &'static str {
        "Directory/file and DNS subdomain brute forcing"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        vec![
            VariantInfo::new(
                "dir",
                "Brute force directories and files on a web server. Returns discovered paths with status codes and sizes.",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "Target URL (e.g. http://example.com)"},
                        "wordlist": {"type": "string", "description": "Wordlist path (default: dirb common.txt)"},
                        "extensions": {"type": "string", "description": "File extensions to try, comma separated (e.g. php,html,txt)"},
                        "threads": {"type": "integer", "description": "Concurrent threads"},
                        "status_codes": {"type": "string", "description": "Positive status codes (e.g. 200,204,301,302,307,401,403)"},
                        "options": options_schema("[\"-k\", \"--timeout\", \"5s\"]")
                    },
                    "required": ["url"]
                }),
            ),
            VariantInfo::new(
                "dns",
                "Brute force DNS subdomains of a domain. Returns discovered subdomains.",
                json!({
                    "type": "object",
                    "properties": {
                        "domain": {"type": "string", "description": "Target domain (e.g. example.com)"},
                        "wordlist": {"type": "string", "description": "Subdomain wordlist path"},
                        "threads": {"type": "integer", "description": "Concurrent threads"},
                        "options": options_schema("[\"-r\", \"8.8.8.8\"]")
                    },
                    "required": ["domain"]
                }),
            ),
        ]
    }
}

/// Parse `/path (Status: 200) [Size: 1234]` lines
pub fn parse_dir_output(text: &str, base_url: &str) -> Vec<NormalizedRecord> {
    let text = strip_ansi(text);
    let base = base_url.trim().trim_end_matches('/');
    parse_lines(&text, |line| {
        let caps = DIR_LINE.captures(line)?;
        let raw_path = caps.get(1)?.as_str();
        let path = if raw_path.starts_with('/') {
            raw_path.to_string()
        } else {
            format!("/{}", raw_path)
        };
        Some(NormalizedRecord::Path(PathRecord {
            full_url: format!("{}{}", base, path),
            status: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            size: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            path,
        }))
    })
}

/// Keep `Found: sub.example.com` lines
pub fn parse_dns_output(text: &str, domain: &str) -> Vec<NormalizedRecord> {
    let text = strip_ansi(text);
    parse_lines(&text, |line| {
        let (_, found) = line.split_once("Found:")?;
        let subdomain = found.split_whitespace().next()?;
        Some(NormalizedRecord::Subdomain(SubdomainRecord {
            subdomain: subdomain.trim_end_matches('.').to_string(),
            domain: domain.trim().to_string(),
        }))
    })
}

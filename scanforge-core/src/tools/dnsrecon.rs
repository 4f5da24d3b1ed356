//! DNSRecon DNS enumeration

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{deserialize_options, options_schema, strip_ansi, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ConflictRule, ExecutionOutcome, ScratchArtifact, TargetPlacement,
    ToolSpec,
};
use crate::parsers::{parse_document, parse_lines, OutputShape, ParsedOutput};
use crate::records::{DnsRecord, NormalizedRecord};

pub const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/dnsrecon.txt";

const RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "CNAME", "MX", "NS", "SOA", "TXT", "SPF", "SRV", "PTR",
];

const OUTPUT_CONFLICTS: &[ConflictRule] = &[
    ConflictRule::exact("-j").with_value(),
    ConflictRule::exact("--json").with_value(),
];

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum DnsreconRequest {
    /// SOA, NS, A, AAAA, MX and SRV enumeration
    Std(DomainScan),
    /// Subdomain brute force
    Brt(BruteForceScan),
    Srv(DomainScan),
    /// Zone transfer against every nameserver
    Axfr(DomainScan),
    /// Reverse lookup over an IP range
    Rvl(ReverseScan),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainScan {
    #[serde(default)]
    pub domain: String,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BruteForceScan {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub wordlist: Option<String>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseScan {
    #[serde(default)]
    pub ip_range: String,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

impl DnsreconRequest {
    fn scan_type(&self) -> &'static str {
        match self {
            DnsreconRequest::Std(_) => "std",
            DnsreconRequest::Brt(_) => "brt",
            DnsreconRequest::Srv(_) => "srv",
            DnsreconRequest::Axfr(_) => "axfr",
            DnsreconRequest::Rvl(_) => "rvl",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dnsrecon;

impl ToolSpec for Dnsrecon {
    type Request = DnsreconRequest;

    fn name(&self) -> &'static str {
        "dnsrecon"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::JsonDocument
    }

    fn timeout(&self, _request: &DnsreconRequest) -> Duration {
        Duration::from_secs(300)
    }

    fn artifact_suffix(&self, _request: &DnsreconRequest) -> Option<&'static str> {
        Some(".json")
    }

    fn command(
        &self,
        request: &DnsreconRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        let scan_type = ["-t".to_string(), request.scan_type().to_string()];
        let builder = ctx.command();

        let builder = match request {
            DnsreconRequest::Std(scan) | DnsreconRequest::Srv(scan) | DnsreconRequest::Axfr(scan) => {
                builder
                    .placement(TargetPlacement::Flag("-d"))
                    .target_label("domain")
                    .target(scan.domain.clone())
                    .target_args(scan_type)
                    .options(scan.options.iter().cloned())
            }
            DnsreconRequest::Brt(scan) => builder
                .placement(TargetPlacement::Flag("-d"))
                .target_label("domain")
                .target(scan.domain.clone())
                .target_args(scan_type)
                .target_args([
                    "-D".to_string(),
                    ctx.wordlist_or(scan.wordlist.as_deref(), DEFAULT_WORDLIST),
                ])
                .options(scan.options.iter().cloned()),
            DnsreconRequest::Rvl(scan) => builder
                .placement(TargetPlacement::Flag("-r"))
                .target_label("IP range")
                .target(scan.ip_range.clone())
                .target_args(scan_type)
                .options(scan.options.iter().cloned()),
        };

        Ok(builder
            .mandate_with("-j", ctx.artifact_arg()?)
            .conflicts(OUTPUT_CONFLICTS))
    }

    fn parse(
        &self,
        _request: &DnsreconRequest,
        outcome: &ExecutionOutcome,
        artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        if let Some(json) = artifact.and_then(ScratchArtifact::contents) {
            match parse_document::<Value>("dnsrecon", &json) {
                Ok(document) => return Ok(ParsedOutput::new(records_from_json(&document)).dedup()),
                Err(e) => tracing::debug!("{}, falling back to stdout", e),
            }
        }
        Ok(ParsedOutput::new(parse_stdout(&outcome.stdout)).dedup())
    }
}

impl Catalogued for Dnsrecon {
    fn description(&self) -> &'static str {
        "DNS enumeration: standard records, brute force, SRV, zone transfer and reverse lookups"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        let domain_schema = |example: &str| {
            json!({
                "type": "object",
                "properties": {
                    "domain": {"type": "string", "description": "Target domain (e.g. example.com)"},
                    "options": options_schema(example)
                },
                "required": ["domain"]
            })
        };
        vec![
            VariantInfo::new(
                "std",
                "Standard enumeration: SOA, NS, A, AAAA, MX and SRV records.",
                domain_schema("[\"-n\", \"8.8.8.8\"]"),
            ),
            VariantInfo::new(
                "brt",
                "Brute force subdomains from a wordlist.",
                json!({
                    "type": "object",
                    "properties": {
                        "domain": {"type": "string", "description": "Target domain"},
                        "wordlist": {"type": "string", "description": "Subdomain wordlist path"},
                        "options": options_schema("[\"--threads\", \"10\"]")
                    },
                    "required": ["domain"]
                }),
            ),
            VariantInfo::new(
                "srv",
                "Enumerate SRV records for common services.",
                domain_schema("[]"),
            ),
            VariantInfo::new(
                "axfr",
                "Attempt a zone transfer against each authoritative nameserver.",
                domain_schema("[]"),
            ),
            VariantInfo::new(
                "rvl",
                "Reverse lookup every address in an IP range.",
                json!({
                    "type": "object",
                    "properties": {
                        "ip_range": {"type": "string", "description": "Range or CIDR (e.g. 192.168.1.0/24)"},
                        "options": options_schema("[]")
                    },
                    "required": ["ip_range"]
                }),
            ),
        ]
    }
}

/// Records from the `-j` report: a list of entries, or an object holding lists
pub fn records_from_json(document: &Value) -> Vec<NormalizedRecord> {
    let entries: Vec<&Map<String, Value>> = match document {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => map
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_object)
            .collect(),
        _ => Vec::new(),
    };
    entries.into_iter().filter_map(record_from_entry).collect()
}

fn record_from_entry(entry: &Map<String, Value>) -> Option<NormalizedRecord> {
    let field = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
    let record_type = field("type")?;
    if record_type.eq_ignore_ascii_case("ScanInfo") {
        return None;
    }

    let value = match record_type.as_str() {
        "A" | "AAAA" => field("address"),
        "CNAME" => field("target"),
        "MX" => field("exchange").or_else(|| field("address")),
        "NS" => field("target").or_else(|| field("address")),
        "SOA" => field("mname").or_else(|| field("address")),
        "TXT" | "SPF" => field("strings").or_else(|| field("text")),
        "SRV" => field("target").map(|t| match entry.get("port") {
            Some(Value::String(p)) => format!("{}:{}", t, p),
            Some(Value::Number(p)) => format!("{}:{}", t, p),
            _ => t,
        }),
        "PTR" => field("address"),
        _ => field("address").or_else(|| field("target")),
    }
    .unwrap_or_default();

    Some(NormalizedRecord::Dns(DnsRecord {
        record_type,
        name: field("name").or_else(|| field("domain")).unwrap_or_default(),
        value,
        raw: None,
    }))
}

/// Fallback over the console output: `[*] \t A www.example.com 93.184.216.34`
pub fn parse_stdout(text: &str) -> Vec<NormalizedRecord> {
    let text = strip_ansi(text);
    parse_lines(&text, |line| {
        let body = line
            .strip_prefix("[*]")
            .or_else(|| line.strip_prefix("[+]"))
            .unwrap_or(line);
        let mut parts = body.split_whitespace();
        let record_type = parts.next()?;
        if !RECORD_TYPES.contains(&record_type) {
            return None;
        }
        let name = parts.next()?;
        let value: Vec<&str> = parts.collect();
        if value.is_empty() {
            return None;
        }
        Some(NormalizedRecord::Dns(DnsRecord {
            record_type: record_type.to_string(),
            name: name.to_string(),
            value: value.join(" "),
            raw: Some(line.to_string()),
        }))
    })
}

//! Normalized records produced by tool output parsers

mod result;

pub use result::{ExecutionSummary, ScanResult, ScanStatus};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Severity level for web findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Lenient mapping used by parsers; anything unrecognised is informational
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Severity::Info)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" | "informational" => Ok(Severity::Info),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// A structured finding, independent of the source tool's native format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedRecord {
    Host(HostRecord),
    Path(PathRecord),
    Subdomain(SubdomainRecord),
    Content(ContentRecord),
    Dns(DnsRecord),
    SmbUser(SmbAccount),
    SmbGroup(SmbAccount),
    SmbShare(SmbShare),
    CrackedHash(CrackedHash),
    WebFinding(WebFinding),
    ServiceCheck(ServiceCheck),
    RawOutput(RawOutput),
}

impl NormalizedRecord {
    /// Key under which two records describe the same discovery
    pub fn identity_key(&self) -> String {
        match self {
            NormalizedRecord::Host(h) => format!(
                "host:{}",
                h.addresses.first().map(|a| a.addr.as_str()).unwrap_or("")
            ),
            NormalizedRecord::Path(p) => format!("path:{}", p.path),
            NormalizedRecord::Subdomain(s) => format!("subdomain:{}", s.subdomain.to_lowercase()),
            NormalizedRecord::Content(c) => format!("content:{} {}", c.method, c.url),
            NormalizedRecord::Dns(d) => {
                format!("dns:{}:{}:{}", d.record_type, d.name, d.value)
            }
            NormalizedRecord::SmbUser(a) => format!("smb_user:{}", a.name),
            NormalizedRecord::SmbGroup(a) => format!("smb_group:{}", a.name),
            NormalizedRecord::SmbShare(s) => format!("smb_share:{}", s.name),
            NormalizedRecord::CrackedHash(c) => format!("hash:{}", c.hash),
            NormalizedRecord::WebFinding(w) => format!(
                "web:{}:{}:{}",
                w.source,
                w.id,
                w.url.as_deref().unwrap_or("")
            ),
            NormalizedRecord::ServiceCheck(s) => format!(
                "check:{}:{}:{}",
                s.protocol, s.address, s.message
            ),
            NormalizedRecord::RawOutput(r) => format!("raw:{}", r.content.len()),
        }
    }
}

/// Remove records whose identity key was already seen, keeping discovery order
pub fn dedup_records(records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.identity_key()))
        .collect()
}

/// Host discovered by a network scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub status: String,
    pub addresses: Vec<HostAddress>,
    #[serde(default)]
    pub hostnames: Vec<HostName>,
    #[serde(default)]
    pub ports: Vec<PortRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAddress {
    pub addr: String,
    pub addrtype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub protocol: String,
    pub port: u16,
    pub state: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<ScriptOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extrainfo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub id: String,
    pub output: String,
}

/// Path found by directory brute forcing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    pub path: String,
    pub status: Option<u16>,
    pub size: Option<u64>,
    pub full_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainRecord {
    pub subdomain: String,
    pub domain: String,
}

/// Content discovered by a recursive content scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub url: String,
    pub status: Option<u16>,
    pub content_length: Option<u64>,
    pub line_count: Option<u64>,
    pub word_count: Option<u64>,
    pub method: String,
    pub wildcard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub record_type: String,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// SMB user or group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmbAccount {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmbShare {
    pub name: String,
    pub share_type: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrackedHash {
    pub hash: String,
    pub password: String,
}

/// Vulnerability or misconfiguration reported by a web scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebFinding {
    pub source: String,
    pub id: String,
    pub name: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted: Vec<String>,
}

impl WebFinding {
    pub fn new(
        source: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            name: name.into(),
            severity,
            url: None,
            method: None,
            description: None,
            extracted: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_extracted(mut self, extracted: Vec<String>) -> Self {
        self.extracted = extracted;
        self
    }
}

/// Status marker printed in front of a network service check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Info,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCheck {
    pub protocol: String,
    pub address: String,
    pub port: Option<u16>,
    pub hostname: String,
    pub outcome: CheckOutcome,
    pub message: String,
    /// Credentials grant administrative access
    pub pwned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
    pub content: String,
    pub line_count: usize,
}

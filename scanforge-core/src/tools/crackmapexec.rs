//! CrackMapExec network service credential checks

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use super::{
    deserialize_options, deserialize_targets, options_schema, strip_ansi, Catalogued, VariantInfo,
};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ExecutionOutcome, ScratchArtifact, TargetPlacement, ToolSpec,
};
use crate::parsers::{parse_lines, OutputShape, ParsedOutput};
use crate::records::{CheckOutcome, NormalizedRecord, ServiceCheck};

pub const PROTOCOLS: &[&str] = &[
    "smb", "ssh", "winrm", "ldap", "mssql", "rdp", "ftp", "wmi", "vnc",
];

#[allow(clippy::expect_used)]
static CHECK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\s+(\S+)\s+(\d+)\s+(\S+)\s+\[([*+\-])\]\s*(.*)$")
        .expect("Hardcoded crackmapexec line regex pattern should be valid")
});

fn default_protocol() -> String {
    "smb".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrackmapexecRequest {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default, alias = "target", deserialize_with = "deserialize_targets")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// NTLM hash for pass-the-hash
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

impl Default for CrackmapexecRequest {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            targets: Vec::new(),
            username: None,
            password: None,
            hash: None,
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Crackmapexec;

impl ToolSpec for Crackmapexec {
    type Request = CrackmapexecRequest;

    fn name(&self) -> &'static str {
        "crackmapexec"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::LineText
    }

    fn timeout(&self, _request: &CrackmapexecRequest) -> Duration {
        Duration::from_secs(300)
    }

    fn validate(&self, request: &CrackmapexecRequest) -> Result<(), ScanError> {
        let protocol = request.protocol.trim().to_lowercase();
        if PROTOCOLS.contains(&protocol.as_str()) {
            Ok(())
        } else {
            Err(ScanError::invalid_input(format!(
                "Unsupported crackmapexec protocol: {} (expected one of {})",
                request.protocol,
                PROTOCOLS.join(", ")
            )))
        }
    }

    fn command(
        &self,
        request: &CrackmapexecRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        let mut credentials = Vec::new();
        if let Some(username) = &request.username {
            credentials.extend(["-u".to_string(), username.clone()]);
        }
        if let Some(password) = &request.password {
            credentials.extend(["-p".to_string(), password.clone()]);
        }
        if let Some(hash) = request.hash.as_deref().filter(|h| !h.is_empty()) {
            credentials.extend(["-H".to_string(), hash.to_string()]);
        }

        Ok(ctx
            .command()
            .base([request.protocol.trim().to_lowercase()])
            .placement(TargetPlacement::Positional)
            .targets(request.targets.iter().cloned())
            .target_args(credentials)
            .options(request.options.iter().cloned()))
    }

    fn parse(
        &self,
        _request: &CrackmapexecRequest,
        outcome: &ExecutionOutcome,
        _artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        Ok(parse_crackmapexec(&outcome.stdout))
    }
}

impl Catalogued for Crackmapexec {
    fn description(&self) -> &'static str {
        "Network service enumeration and credential validation (SMB, WinRM, LDAP, ...)"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        vec![VariantInfo::new(
            "scan",
            "Enumerate a network service and optionally test credentials. Returns one check per host line; successful admin logins are flagged as pwned.",
            json!({
                "type": "object",
                "properties": {
                    "protocol": {"type": "string", "enum": PROTOCOLS, "description": "Service protocol (default smb)"},
                    "targets": {
                        "oneOf": [
                            {"type": "array", "items": {"type": "string"}},
                            {"type": "string"}
                        ],
                        "description": "Hosts or CIDR ranges"
                    },
                    "username": {"type": "string"},
                    "password": {"type": "string"},
                    "hash": {"type": "string", "description": "NTLM hash for pass-the-hash"},
                    "options": options_schema("[\"--shares\"]")
                },
                "required": ["targets"]
            }),
        )]
    }
}

/// `PROTO  host  port  name  [+] message` lines
pub fn parse_crackmapexec(stdout: &str) -> ParsedOutput {
    let text = strip_ansi(stdout);
    let records = parse_lines(&text, |line| {
        let caps = CHECK_LINE.captures(line.trim())?;
        let message = caps.get(6).map(|m| m.as_str().trim()).unwrap_or("");
        let outcome = match caps.get(5).map(|m| m.as_str()) {
            Some("+") => CheckOutcome::Success,
            Some("-") => CheckOutcome::Failure,
            _ => CheckOutcome::Info,
        };
        Some(NormalizedRecord::ServiceCheck(ServiceCheck {
            protocol: caps.get(1)?.as_str().to_lowercase(),
            address: caps.get(2)?.as_str().to_string(),
            port: caps.get(3)?.as_str().parse().ok(),
            hostname: caps.get(4)?.as_str().to_string(),
            outcome,
            message: message.to_string(),
            pwned: message.contains("Pwn3d!"),
        }))
    });

    let pwned = records
        .iter()
        .any(|r| matches!(r, NormalizedRecord::ServiceCheck(c) if c.pwned));
    let valid = records
        .iter()
        .filter(|r| {
            matches!(r, NormalizedRecord::ServiceCheck(c) if c.outcome == CheckOutcome::Success)
        })
        .count();

    let output = ParsedOutput::new(records);
    if valid == 0 {
        return output;
    }
    output
        .with_metadata("valid_credentials", valid)
        .with_metadata("pwned", pwned)
}

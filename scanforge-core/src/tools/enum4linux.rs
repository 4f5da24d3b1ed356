//! enum4linux SMB/Windows enumeration

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{deserialize_options, options_schema, strip_ansi, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ExecutionOutcome, ScratchArtifact, TargetPlacement, ToolSpec,
};
use crate::parsers::{OutputShape, ParsedOutput};
use crate::records::{NormalizedRecord, SmbAccount, SmbShare};

#[allow(clippy::expect_used)]
static ACCOUNT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(user|group):\[([^\]]*)\]\s*(?:rid:\[([^\]]*)\])?")
        .expect("Hardcoded enum4linux account regex pattern should be valid")
});

#[allow(clippy::expect_used)]
static SHARE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\s+(Disk|IPC|Printer)\s*(.*)$")
        .expect("Hardcoded enum4linux share regex pattern should be valid")
});

#[allow(clippy::expect_used)]
static SAMBA_OS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"OS=\[([^\]]*)\](?:\s*Server=\[([^\]]*)\])?")
        .expect("Hardcoded enum4linux OS regex pattern should be valid")
});

/// What to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enum4linuxMode {
    Basic,
    Users,
    Shares,
    Groups,
    Policy,
    Comprehensive,
    NullSession,
}

impl Enum4linuxMode {
    fn flags(self) -> &'static [&'static str] {
        match self {
            Enum4linuxMode::Basic => &["-a"],
            Enum4linuxMode::Users => &["-U"],
            Enum4linuxMode::Shares => &["-S"],
            Enum4linuxMode::Groups => &["-G"],
            Enum4linuxMode::Policy => &["-P"],
            Enum4linuxMode::Comprehensive => &["-a", "-v"],
            Enum4linuxMode::NullSession => &["-a", "-u", "", "-p", ""],
        }
    }

    fn description(self) -> &'static str {
        match self {
            Enum4linuxMode::Basic => "All simple enumeration (users, shares, groups, policy, OS).",
            Enum4linuxMode::Users => "Enumerate users via RPC.",
            Enum4linuxMode::Shares => "Enumerate SMB shares.",
            Enum4linuxMode::Groups => "Enumerate groups and members.",
            Enum4linuxMode::Policy => "Retrieve the password policy.",
            Enum4linuxMode::Comprehensive => "All enumeration with verbose output.",
            Enum4linuxMode::NullSession => "All enumeration over an anonymous null session.",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Enum4linuxMode::Basic => "basic",
            Enum4linuxMode::Users => "users",
            Enum4linuxMode::Shares => "shares",
            Enum4linuxMode::Groups => "groups",
            Enum4linuxMode::Policy => "policy",
            Enum4linuxMode::Comprehensive => "comprehensive",
            Enum4linuxMode::NullSession => "null_session",
        }
    }

    const ALL: [Enum4linuxMode; 7] = [
        Enum4linuxMode::Basic,
        Enum4linuxMode::Users,
        Enum4linuxMode::Shares,
        Enum4linuxMode::Groups,
        Enum4linuxMode::Policy,
        Enum4linuxMode::Comprehensive,
        Enum4linuxMode::NullSession,
    ];
}

#[derive(Debug, Clone, Deserialize)]
pub struct Enum4linuxRequest {
    #[serde(rename = "variant")]
    pub mode: Enum4linuxMode,
    #[serde(default)]
    pub target: String,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Enum4linux;

impl ToolSpec for Enum4linux {
    type Request = Enum4linuxRequest;

    fn name(&self) -> &'static str {
        "enum4linux"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::LineText
    }

    fn timeout(&self, _request: &Enum4linuxRequest) -> Duration {
        Duration::from_secs(300)
    }

    fn command(
        &self,
        request: &Enum4linuxRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        Ok(ctx
            .command()
            .placement(TargetPlacement::Trailing)
            .target(request.target.clone())
            .options(request.mode.flags().iter().copied())
            .options(request.options.iter().cloned()))
    }

    fn parse(
        &self,
        _request: &Enum4linuxRequest,
        outcome: &ExecutionOutcome,
        _artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        Ok(parse_enum4linux(&outcome.stdout))
    }
}

impl Catalogued for Enum4linux {
    fn description(&self) -> &'static str {
        "Enumerate users, groups, shares and policies from Windows/Samba hosts"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        Enum4linuxMode::ALL
            .iter()
            .map(|mode| {
                VariantInfo::new(
                    mode.name(),
                    mode.description(),
                    json!({
                        "type": "object",
                        "properties": {
                            "target": {"type": "string", "description": "Target host IP or name"},
                            "options": options_schema("[\"-r\", \"-K\", \"5000\"]")
                        },
                        "required": ["target"]
                    }),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Users,
    Groups,
    Shares,
    Policies,
    Printers,
}

fn section_for(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    if lower.contains("getting the global users list") || lower.contains("users on ") {
        Some(Section::Users)
    } else if lower.contains("getting the group list") || lower.contains("groups on ") {
        Some(Section::Groups)
    } else if lower.contains("getting the available shares") || lower.contains("share enumeration on")
    {
        Some(Section::Shares)
    } else if lower.contains("getting the password policy") || lower.contains("password policy information")
    {
        Some(Section::Policies)
    } else if lower.contains("getting the printer list") || lower.contains("printer info") {
        Some(Section::Printers)
    } else {
        None
    }
}

/// Parse the sectioned console report
pub fn parse_enum4linux(stdout: &str) -> ParsedOutput {
    let text = strip_ansi(stdout);
    let mut records = Vec::new();
    let mut domain: Option<String> = None;
    let mut os = Map::new();
    let mut policies = Vec::new();
    let mut printers = Vec::new();
    let mut section = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if line.starts_with('=') {
            continue;
        }
        // boxed banner: `|    Users on 10.0.0.5    |`
        if line.starts_with('|') {
            section = section_for(line);
            continue;
        }
        if let Some(next) = section_for(line) {
            section = Some(next);
        }

        if let Some((_, name)) = line.split_once("Domain Name:") {
            domain = Some(name.trim().to_string());
        } else if let Some((_, name)) = line.split_once("Workgroup:") {
            if domain.is_none() {
                domain = Some(name.trim().to_string());
            }
        } else if let Some((_, name)) = line.split_once("Got domain/workgroup name:") {
            if domain.is_none() {
                domain = Some(name.trim().to_string());
            }
        }

        if let Some((_, name)) = line.split_once("OS name:") {
            os.insert("name".to_string(), Value::String(name.trim().to_string()));
        } else if let Some((_, version)) = line.split_once("OS version:") {
            os.insert("version".to_string(), Value::String(version.trim().to_string()));
        } else if let Some(caps) = SAMBA_OS.captures(line) {
            if let Some(name) = caps.get(1).filter(|m| !m.as_str().is_empty()) {
                os.entry("name".to_string())
                    .or_insert_with(|| Value::String(name.as_str().to_string()));
            }
            if let Some(server) = caps.get(2).filter(|m| !m.as_str().is_empty()) {
                os.entry("server".to_string())
                    .or_insert_with(|| Value::String(server.as_str().to_string()));
            }
        }

        if let Some(caps) = ACCOUNT_LINE.captures(line) {
            let name = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            if !name.is_empty() {
                let account = SmbAccount {
                    name: name.to_string(),
                    rid: caps.get(3).map(|m| m.as_str().to_string()),
                };
                records.push(match caps.get(1).map(|m| m.as_str()) {
                    Some("group") => NormalizedRecord::SmbGroup(account),
                    _ => NormalizedRecord::SmbUser(account),
                });
            }
            continue;
        }

        match section {
            Some(Section::Shares) => {
                if line.starts_with("Sharename") || line.starts_with("---") {
                    continue;
                }
                if let Some(caps) = SHARE_LINE.captures(line) {
                    records.push(NormalizedRecord::SmbShare(SmbShare {
                        name: caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
                        share_type: caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string(),
                        comment: caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default().to_string(),
                    }));
                }
            }
            Some(Section::Policies) => {
                if let Some((key, value)) = line.split_once(':') {
                    let key = key.trim_start_matches("[+]").trim();
                    let value = value.trim();
                    if !key.is_empty() && !value.is_empty() {
                        policies.push(json!({"name": key, "value": value}));
                    }
                }
            }
            Some(Section::Printers) => {
                if !line.starts_with('[') && !line.to_lowercase().contains("no printers") {
                    printers.push(Value::String(line.to_string()));
                }
            }
            _ => {}
        }
    }

    let mut output = ParsedOutput::new(records).dedup();
    if let Some(domain) = domain.filter(|d| !d.is_empty()) {
        output = output.with_metadata("workgroup_domain", domain);
    }
    if !os.is_empty() {
        output = output.with_metadata("os_info", Value::Object(os));
    }
    if !policies.is_empty() {
        output = output.with_metadata("policies", Value::Array(policies));
    }
    if !printers.is_empty() {
        output = output.with_metadata("printers", Value::Array(printers));
    }
    output
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Starting enum4linux v0.9.1 ( http://labs.portcullis.co.uk/application/enum4linux/ )
 ==========================================
|    Enumerating Workgroup/Domain on 10.0.0.5    |
 ==========================================
[+] Got domain/workgroup name: WORKGROUP
 ===================================
|    OS information on 10.0.0.5    |
 ===================================
[+] Got OS info for 10.0.0.5 from smbclient: Domain=[WORKGROUP] OS=[Windows 6.1] Server=[Samba 4.3.11]
 ==========================
|    Users on 10.0.0.5    |
 ==========================
index: 0x1 RID: 0x3e8 acb: 0x00000010 Account: admin\tName: \tDesc:
user:[admin] rid:[0x3e8]
user:[guest] rid:[0x3e9]
 ======================================
|    Share Enumeration on 10.0.0.5    |
 ======================================
\tSharename       Type      Comment
\t---------       ----      -------
\tprint$          Disk      Printer Drivers
\tIPC$            IPC       IPC Service (Samba 4.3.11)
\tbackups         Disk
 =================================================
|    Password Policy Information for 10.0.0.5    |
 =================================================
[+] Minimum password length: 5
[+] Password history length: None
 ===========================
|    Groups on 10.0.0.5    |
 ===========================
group:[Domain Admins] rid:[0x200]
enum4linux complete on Mon Jan  1 00:00:00 2024
";

    #[test]
    fn test_parse_sections() {
        let parsed = parse_enum4linux(SAMPLE);
        let users: Vec<&SmbAccount> = parsed
            .records
            .iter()
            .filter_map(|r| match r {
                NormalizedRecord::SmbUser(a) => Some(a),
                _ => None,
            })
            .collect();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "admin");
        assert_eq!(users[0].rid.as_deref(), Some("0x3e8"));

        let shares: Vec<&SmbShare> = parsed
            .records
            .iter()
            .filter_map(|r| match r {
                NormalizedRecord::SmbShare(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[1].name, "IPC$");
        assert_eq!(shares[1].share_type, "IPC");
        assert_eq!(shares[1].comment, "IPC Service (Samba 4.3.11)");
        assert_eq!(shares[2].comment, "");

        assert!(parsed
            .records
            .iter()
            .any(|r| matches!(r, NormalizedRecord::SmbGroup(g) if g.name == "Domain Admins")));
    }

    #[test]
    fn test_parse_metadata() {
        let parsed = parse_enum4linux(SAMPLE);
        assert_eq!(parsed.metadata["workgroup_domain"], "WORKGROUP");
        assert_eq!(parsed.metadata["os_info"]["name"], "Windows 6.1");
        assert_eq!(parsed.metadata["os_info"]["server"], "Samba 4.3.11");
        let policies = parsed.metadata["policies"].as_array().unwrap();
        assert_eq!(policies[0]["name"], "Minimum password length");
        assert_eq!(policies[0]["value"], "5");
    }

    #[test]
    fn test_domain_name_preferred_over_workgroup() {
        let parsed = parse_enum4linux("Workgroup: WG\nDomain Name: CORP\n");
        assert_eq!(parsed.metadata["workgroup_domain"], "CORP");
    }

    #[test]
    fn test_empty_output() {
        let parsed = parse_enum4linux("");
        assert!(parsed.records.is_empty());
        assert!(parsed.metadata.is_empty());
    }

    #[test]
    fn test_target_goes_last() {
        let ctx = BuildContext::for_test("enum4linux", None);
        let request = Enum4linuxRequest {
            mode: Enum4linuxMode::NullSession,
            target: "10.0.0.5".to_string(),
            options: vec![],
        };
        let inv = Enum4linux.command(&request, &ctx).unwrap().build().unwrap();
        assert_eq!(
            inv.argv(),
            ["enum4linux", "-a", "-u", "", "-p", "", "10.0.0.5"]
        );
    }

    #[test]
    fn test_mode_from_variant_tag() {
        let request: Enum4linuxRequest =
            serde_json::from_value(json!({"variant": "comprehensive", "target": "10.0.0.5"}))
                .unwrap();
        assert_eq!(request.mode, Enum4linuxMode::Comprehensive);
    }
}

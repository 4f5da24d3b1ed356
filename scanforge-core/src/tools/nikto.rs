//! Nikto web server scanner

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{deserialize_options, options_schema, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ConflictRule, ExecutionOutcome, ScratchArtifact, TargetPlacement,
    ToolSpec,
};
use crate::parsers::{parse_document, OutputShape, ParsedOutput};
use crate::records::{NormalizedRecord, Severity, WebFinding};

/// Nikto accepts its flags in any case
const OUTPUT_CONFLICTS: &[ConflictRule] = &[
    ConflictRule::exact("-Format").with_value().ignore_case(),
    ConflictRule::exact("-f").with_value().ignore_case(),
    ConflictRule::exact("-o").with_value().ignore_case(),
    ConflictRule::exact("-output").with_value().ignore_case(),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NiktoRequest {
    /// Full URL including scheme, e.g. `https://example.com:8443`
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

/// Host, port and TLS flag derived from the target URL
#[derive(Debug, Clone, PartialEq, Eq)]
struct NiktoTarget {
    host: String,
    port: u16,
    ssl: bool,
}

fn nikto_target(raw: &str) -> Result<NiktoTarget, ScanError> {
    let invalid = || {
        ScanError::invalid_input(
            "Invalid target URL format. Nikto requires protocol (http:// or https://).",
        )
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ScanError::invalid_input("Could not parse hostname from target URL."))?;
    Ok(NiktoTarget {
        host: host.to_string(),
        port: url.port_or_known_default().unwrap_or(80),
        ssl: url.scheme() == "https",
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Nikto;

impl ToolSpec for Nikto {
    type Request = NiktoRequest;

    fn name(&self) -> &'static str {
        "nikto"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::JsonDocument
    }

    fn timeout(&self, _request: &NiktoRequest) -> Duration {
        Duration::from_secs(600)
    }

    fn validate(&self, request: &NiktoRequest) -> Result<(), ScanError> {
        // an empty URL is reported by the builder as missing input
        if request.url.trim().is_empty() {
            return Ok(());
        }
        nikto_target(&request.url).map(|_| ())
    }

    fn artifact_suffix(&self, _request: &NiktoRequest) -> Option<&'static str> {
        Some(".json")
    }

    fn command(
        &self,
        request: &NiktoRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        let builder = ctx
            .command()
            .placement(TargetPlacement::Flag("-h"))
            .target_label("target URL");
        if request.url.trim().is_empty() {
            return Ok(builder);
        }

        let target = nikto_target(&request.url)?;
        let mut extra = vec!["-p".to_string(), target.port.to_string()];
        if target.ssl {
            extra.push("-ssl".to_string());
        }

        Ok(builder
            .target(target.host)
            .target_args(extra)
            .options(request.options.iter().cloned())
            .mandate_with("-Format", "json")
            .mandate_with("-o", ctx.artifact_arg()?)
            .conflicts(OUTPUT_CONFLICTS))
    }

    fn parse(
        &self,
        request: &NiktoRequest,
        outcome: &ExecutionOutcome,
        artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        let report = artifact
            .map(ScratchArtifact::read)
            .transpose()?
            .flatten()
            .ok_or_else(|| ScanError::parse("nikto", "no JSON report was written"))?;
        let mut output = parse_nikto_json(&report, Url::parse(request.url.trim()).ok().as_ref())?;

        let summary = outcome.stdout.trim();
        if !summary.is_empty() {
            output = output.with_metadata("summary", summary);
        }
        Ok(output)
    }
}

impl Catalogued for Nikto {
    fn description(&self) -> &'static str {
        "Web server vulnerability and misconfiguration scanner"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        vec![VariantInfo::new(
            "scan",
            "Scan a web server for dangerous files, outdated software and misconfigurations. Returns one finding per reported item.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Target URL including protocol (e.g. \"https://example.com\")"},
                    "options": options_schema("[\"-Tuning\", \"x 6\"]")
                },
                "required": ["url"]
            }),
        )]
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NiktoReport {
    Hosts(Vec<NiktoHost>),
    Host(NiktoHost),
}

#[derive(Debug, Default, Deserialize)]
struct NiktoHost {
    #[serde(default)]
    host: Option<Value>,
    #[serde(default)]
    ip: Option<Value>,
    #[serde(default)]
    port: Option<Value>,
    #[serde(default)]
    banner: Option<Value>,
    #[serde(default)]
    vulnerabilities: Vec<NiktoItem>,
}

#[derive(Debug, Default, Deserialize)]
struct NiktoItem {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, rename = "OSVDB")]
    osvdb: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    references: Option<Value>,
}

/// Nikto writes ids and ports as either strings or numbers
fn text(value: &Option<Value>) -> Option<String> {
    match value.as_ref()? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a `-Format json` report. `base` resolves relative finding paths.
pub fn parse_nikto_json(report: &str, base: Option<&Url>) -> Result<ParsedOutput, ScanError> {
    let hosts = match parse_document::<NiktoReport>("nikto", report)? {
        NiktoReport::Hosts(hosts) => hosts,
        NiktoReport::Host(host) => vec![host],
    };

    let mut records = Vec::new();
    let mut host_meta = Vec::new();
    for host in hosts {
        host_meta.push(json!({
            "host": text(&host.host),
            "ip": text(&host.ip),
            "port": text(&host.port),
            "banner": text(&host.banner),
        }));

        for item in host.vulnerabilities {
            let id = text(&item.id).unwrap_or_default();
            let message = item.msg.unwrap_or_default();
            let mut finding = WebFinding::new("nikto", id, message, Severity::Info);
            if let Some(path) = item.url.filter(|u| !u.is_empty()) {
                let full = base
                    .and_then(|b| b.join(&path).ok())
                    .map(String::from)
                    .unwrap_or(path);
                finding = finding.with_url(full);
            }
            if let Some(method) = item.method.filter(|m| !m.is_empty()) {
                finding = finding.with_method(method);
            }
            let osvdb = text(&item.osvdb).filter(|o| o != "0");
            let refs = text(&item.references).or(osvdb.map(|o| format!("OSVDB-{}", o)));
            if let Some(refs) = refs {
                finding = finding.with_description(refs);
            }
            records.push(NormalizedRecord::WebFinding(finding));
        }
    }

    Ok(ParsedOutput::new(records)
        .dedup()
        .with_metadata("hosts", Value::Array(host_meta)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const REPORT: &str = r#"[{"host":"example.test","ip":"10.0.0.8","port":"443","banner":"nginx/1.18.0",
        "vulnerabilities":[
          {"id":"999100","OSVDB":"0","method":"GET","url":"/","msg":"The anti-clickjacking X-Frame-Options header is not present."},
          {"id":"000726","OSVDB":"3092","method":"GET","url":"/admin/","msg":"This might be interesting."}
        ]}]"#;

    fn request(url: &str) -> NiktoRequest {
        NiktoRequest {
            url: url.to_string(),
            options: Vec::new(),
        }
    }

    #[test]
    fn test_url_validation() {
        assert!(Nikto.validate(&request("https://example.test")).is_ok());
        assert!(Nikto.validate(&request("")).is_ok());
        let err = Nikto.validate(&request("example.test")).unwrap_err();
        assert!(err.to_string().contains("requires protocol"));
        assert!(Nikto.validate(&request("ftp://example.test")).is_err());
    }

    #[test]
    fn test_https_command_layout() {
        let artifact = ScratchArtifact::create("nikto", ".json", Uuid::new_v4()).unwrap();
        let ctx = BuildContext::for_test("nikto", Some(&artifact));
        let req = NiktoRequest {
            url: "https://example.test:8443/app".to_string(),
            options: vec![
                "-Tuning".to_string(),
                "x 6".to_string(),
                "-FORMAT".to_string(),
                "xml".to_string(),
                "-Output".to_string(),
                "/tmp/elsewhere".to_string(),
            ],
        };
        let inv = Nikto.command(&req, &ctx).unwrap().build().unwrap();
        assert_eq!(
            inv.argv(),
            [
                "nikto",
                "-h",
                "example.test",
                "-p",
                "8443",
                "-ssl",
                "-Tuning",
                "x 6",
                "-Format",
                "json",
                "-o",
                artifact.arg().as_str(),
            ]
        );
    }

    #[test]
    fn test_unrelated_flags_starting_with_o_survive() {
        let artifact = ScratchArtifact::create("nikto", ".json", Uuid::new_v4()).unwrap();
        let ctx = BuildContext::for_test("nikto", Some(&artifact));
        let req = NiktoRequest {
            url: "http://example.test".to_string(),
            options: vec!["-followredirects".to_string()],
        };
        let inv = Nikto.command(&req, &ctx).unwrap().build().unwrap();
        assert_eq!(inv.options(), ["-followredirects"]);
        assert_eq!(&inv.argv()[3..5], ["-p", "80"]);
    }

    #[test]
    fn test_empty_url_is_missing_input() {
        let ctx = BuildContext::for_test("nikto", None);
        let err = Nikto.command(&request("  "), &ctx).unwrap().build().unwrap_err();
        assert!(matches!(err, ScanError::MissingInput(_)));
    }

    #[test]
    fn test_parse_report() {
        let base = Url::parse("https://example.test").unwrap();
        let parsed = parse_nikto_json(REPORT, Some(&base)).unwrap();
        assert_eq!(parsed.records.len(), 2);

        let NormalizedRecord::WebFinding(admin) = &parsed.records[1] else {
            panic!("expected web finding");
        };
        assert_eq!(admin.source, "nikto");
        assert_eq!(admin.id, "000726");
        assert_eq!(admin.severity, Severity::Info);
        assert_eq!(admin.url.as_deref(), Some("https://example.test/admin/"));
        assert_eq!(admin.description.as_deref(), Some("OSVDB-3092"));

        let NormalizedRecord::WebFinding(first) = &parsed.records[0] else {
            panic!("expected web finding");
        };
        assert_eq!(first.description, None);
        assert_eq!(parsed.metadata["hosts"][0]["banner"], "nginx/1.18.0");
    }

    #[test]
    fn test_single_object_report_with_numeric_port() {
        let report = r#"{"host":"10.0.0.8","port":80,"vulnerabilities":[]}"#;
        let parsed = parse_nikto_json(report, None).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.metadata["hosts"][0]["port"], "80");
    }

    #[test]
    fn test_missing_or_broken_report_is_parse_error() {
        let outcome = ExecutionOutcome {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            truncated: false,
            started_at: chrono::Utc::now(),
            duration: Duration::ZERO,
        };
        let err = Nikto
            .parse(&request("http://example.test"), &outcome, None)
            .unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));

        assert!(parse_nikto_json("{ \"host\": ", None).is_err());
    }
}

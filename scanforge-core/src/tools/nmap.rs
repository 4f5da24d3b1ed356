//! Nmap network scanner

use std::time::Duration;

use roxmltree::Node;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{deserialize_options, deserialize_targets, options_schema, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ConflictRule, ExecutionOutcome, ScratchArtifact, TargetPlacement,
    ToolSpec,
};
use crate::parsers::{attr, child, children, parse_xml, OutputShape, ParsedOutput};
use crate::records::{
    HostAddress, HostName, HostRecord, NormalizedRecord, PortRecord, ScriptOutput, ServiceInfo,
};

/// User flags that would redirect or duplicate the XML report
const OUTPUT_CONFLICTS: &[ConflictRule] = &[
    ConflictRule::prefix("-oX").with_value(),
    ConflictRule::prefix("-oA").with_value(),
    ConflictRule::prefix("-oG").with_value(),
    ConflictRule::prefix("-oS").with_value(),
    ConflictRule::prefix("-oN").with_value(),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NmapRequest {
    #[serde(default, deserialize_with = "deserialize_targets")]
    pub targets: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Nmap;

impl ToolSpec for Nmap {
    type Request = NmapRequest;

    fn name(&self) -> &'static str {
        "nmap"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::Xml
    }

    fn timeout(&self, _request: &NmapRequest) -> Duration {
        Duration::from_secs(600)
    }

    fn command(
        &self,
        request: &NmapRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        Ok(ctx
            .command()
            .placement(TargetPlacement::Positional)
            .target_label("targets")
            .targets(request.targets.iter().cloned())
            .options(request.options.iter().cloned())
            .mandate_with("-oX", "-")
            .conflicts(OUTPUT_CONFLICTS))
    }

    fn parse(
        &self,
        _request: &NmapRequest,
        outcome: &ExecutionOutcome,
        _artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        parse_nmap_xml(&outcome.stdout)
    }
}

impl Catalogued for Nmap {
    fn description(&self) -> &'static str {
        "Network exploration and port scanning"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        vec![VariantInfo::new(
            "scan",
            "Run an nmap scan against one or more hosts, networks or ranges. Returns hosts with addresses, hostnames, ports, services and NSE script output.",
            json!({
                "type": "object",
                "properties": {
                    "targets": {
                        "oneOf": [
                            {"type": "array", "items": {"type": "string"}},
                            {"type": "string"}
                        ],
                        "description": "Hosts, CIDR networks or ranges (e.g. \"192.168.1.1\", \"10.0.0.0/24\")"
                    },
                    "options": options_schema("[\"-sV\", \"-p\", \"1-1000\"]")
                },
                "required": ["targets"]
            }),
        )]
    }
}

/// Parse `-oX` output into host records and run statistics
pub fn parse_nmap_xml(xml: &str) -> Result<ParsedOutput, ScanError> {
    if xml.trim().is_empty() {
        return Ok(ParsedOutput::default());
    }

    let doc = parse_xml("nmap", xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "nmaprun" {
        return Err(ScanError::parse(
            "nmap",
            format!("unexpected root element <{}>", root.tag_name().name()),
        ));
    }

    let records = children(root, "host")
        .map(|host| NormalizedRecord::Host(parse_host(host)))
        .collect();

    let mut output = ParsedOutput::new(records);
    if let Some(args) = root.attribute("args") {
        output = output.with_metadata("args", args);
    }
    if let Some(version) = root.attribute("version") {
        output = output.with_metadata("nmap_version", version);
    }
    if let Some(stats) = child(root, "runstats") {
        output = output.with_metadata("runstats", parse_runstats(stats));
    }
    Ok(output)
}

fn parse_host(host: Node<'_, '_>) -> HostRecord {
    let status = child(host, "status")
        .map(|s| attr(s, "state"))
        .unwrap_or_else(|| "unknown".to_string());

    let addresses = children(host, "address")
        .map(|a| HostAddress {
            addr: attr(a, "addr"),
            addrtype: attr(a, "addrtype"),
        })
        .collect();

    let hostnames = child(host, "hostnames")
        .map(|names| {
            children(names, "hostname")
                .map(|h| HostName {
                    name: attr(h, "name"),
                    kind: non_empty(h.attribute("type")),
                })
                .collect()
        })
        .unwrap_or_default();

    let ports = child(host, "ports")
        .map(|ports| children(ports, "port").filter_map(parse_port).collect())
        .unwrap_or_default();

    HostRecord {
        status,
        addresses,
        hostnames,
        ports,
    }
}

fn parse_port(port: Node<'_, '_>) -> Option<PortRecord> {
    let number = port.attribute("portid")?.parse().ok()?;
    let state = child(port, "state");

    let service = child(port, "service").map(|s| ServiceInfo {
        name: non_empty(s.attribute("name")),
        product: non_empty(s.attribute("product")),
        version: non_empty(s.attribute("version")),
        extrainfo: non_empty(s.attribute("extrainfo")),
        method: non_empty(s.attribute("method")),
        conf: non_empty(s.attribute("conf")),
    });

    let scripts = children(port, "script")
        .map(|s| ScriptOutput {
            id: attr(s, "id"),
            output: attr(s, "output"),
        })
        .collect();

    Some(PortRecord {
        protocol: attr(port, "protocol"),
        port: number,
        state: state.map(|s| attr(s, "state")).unwrap_or_default(),
        reason: state.map(|s| attr(s, "reason")).unwrap_or_default(),
        service,
        scripts,
    })
}

fn parse_runstats(stats: Node<'_, '_>) -> Value {
    let mut map = Map::new();
    if let Some(finished) = child(stats, "finished") {
        for name in ["time", "timestr", "elapsed", "summary", "exit"] {
            if let Some(value) = finished.attribute(name) {
                map.insert(name.to_string(), Value::String(value.to_string()));
            }
        }
    }
    if let Some(hosts) = child(stats, "hosts") {
        for (key, name) in [("hosts_up", "up"), ("hosts_down", "down"), ("hosts_total", "total")]
        {
            if let Some(count) = hosts.attribute(name).and_then(|v| v.parse::<u64>().ok()) {
                map.insert(key.to_string(), Value::from(count));
            }
        }
    }
    Value::Object(map)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sV -oX - 192.168.1.10" start="1700000000" version="7.94">
<host starttime="1700000000" endtime="1700000010">
  <status state="up" reason="syn-ack" reason_ttl="0"/>
  <address addr="192.168.1.10" addrtype="ipv4"/>
  <address addr="AA:BB:CC:DD:EE:FF" addrtype="mac" vendor="Acme"/>
  <hostnames><hostname name="web.lab" type="PTR"/></hostnames>
  <ports>
    <extraports state="closed" count="998"/>
    <port protocol="tcp" portid="22">
      <state state="open" reason="syn-ack" reason_ttl="64"/>
      <service name="ssh" product="OpenSSH" version="8.9p1" extrainfo="Ubuntu" method="probed" conf="10"/>
    </port>
    <port protocol="tcp" portid="80">
      <state state="open" reason="syn-ack" reason_ttl="64"/>
      <service name="http" product="nginx" method="probed" conf="10"/>
      <script id="http-title" output="Welcome"/>
    </port>
  </ports>
</host>
<host>
  <status state="down" reason="no-response"/>
  <address addr="192.168.1.11" addrtype="ipv4"/>
</host>
<runstats>
  <finished time="1700000010" timestr="Tue Nov 14" elapsed="10.02" summary="Nmap done" exit="success"/>
  <hosts up="1" down="1" total="2"/>
</runstats>
</nmaprun>"#;

    #[test]
    fn test_parse_hosts_ports_services() {
        let parsed = parse_nmap_xml(SAMPLE).unwrap();
        assert_eq!(parsed.records.len(), 2);

        let NormalizedRecord::Host(host) = &parsed.records[0] else {
            panic!("expected host record");
        };
        assert_eq!(host.status, "up");
        assert_eq!(host.addresses.len(), 2);
        assert_eq!(host.addresses[0].addr, "192.168.1.10");
        assert_eq!(host.hostnames[0].name, "web.lab");
        assert_eq!(host.hostnames[0].kind.as_deref(), Some("PTR"));
        assert_eq!(host.ports.len(), 2);

        let ssh = &host.ports[0];
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.state, "open");
        let service = ssh.service.as_ref().unwrap();
        assert_eq!(service.product.as_deref(), Some("OpenSSH"));
        assert_eq!(service.version.as_deref(), Some("8.9p1"));

        let http = &host.ports[1];
        assert!(http.service.as_ref().unwrap().version.is_none());
        assert_eq!(http.scripts[0].id, "http-title");
        assert_eq!(http.scripts[0].output, "Welcome");

        let NormalizedRecord::Host(down) = &parsed.records[1] else {
            panic!("expected host record");
        };
        assert_eq!(down.status, "down");
        assert!(down.ports.is_empty());
    }

    #[test]
    fn test_runstats_metadata() {
        let parsed = parse_nmap_xml(SAMPLE).unwrap();
        let stats = &parsed.metadata["runstats"];
        assert_eq!(stats["elapsed"], "10.02");
        assert_eq!(stats["hosts_up"], 1);
        assert_eq!(stats["hosts_total"], 2);
        assert_eq!(parsed.metadata["nmap_version"], "7.94");
    }

    #[test]
    fn test_empty_stdout_yields_no_records() {
        let parsed = parse_nmap_xml("  \n").unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn test_truncated_xml_is_parse_error() {
        let err = parse_nmap_xml(&SAMPLE[..SAMPLE.len() / 2]).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
    }

    #[test]
    fn test_command_replaces_user_output_flags() {
        let ctx = BuildContext::for_test("nmap", None);
        let request = NmapRequest {
            targets: vec!["10.0.0.1".to_string()],
            options: ["-sV", "-oA", "scan", "-oNnormal.txt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        let inv = Nmap.command(&request, &ctx).unwrap().build().unwrap();
        assert_eq!(inv.argv(), ["nmap", "10.0.0.1", "-sV", "-oX", "-"]);
    }

    #[test]
    fn test_missing_targets() {
        let ctx = BuildContext::for_test("nmap", None);
        let err = Nmap
            .command(&NmapRequest::default(), &ctx)
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "No targets specified for nmap scan.");
    }
}

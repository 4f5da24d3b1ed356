//! Hashcat password recovery

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{deserialize_options, options_schema, strip_ansi, Catalogued, VariantInfo};
use crate::error::ScanError;
use crate::invocation::{
    BuildContext, CommandBuilder, ConflictRule, ExecutionOutcome, ScratchArtifact, TargetPlacement,
    ToolSpec,
};
use crate::parsers::{parse_lines, raw_output, OutputShape, ParsedOutput};
use crate::records::{CrackedHash, NormalizedRecord};

pub const DEFAULT_WORDLIST: &str = "/usr/share/wordlists/rockyou.txt";

/// hashcat exits 1 when the keyspace is exhausted without a crack
const EXIT_EXHAUSTED: i32 = 1;

const OUTPUT_CONFLICTS: &[ConflictRule] = &[
    ConflictRule::exact("-o").with_value(),
    ConflictRule::exact("--outfile").with_value(),
    ConflictRule::exact("--outfile-format").with_value(),
];

/// Hash mode given as a number (`1000`) or a preset name (`ntlm`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HashMode {
    Numeric(u32),
    Named(String),
}

impl HashMode {
    pub fn resolve(&self) -> Result<u32, ScanError> {
        match self {
            HashMode::Numeric(mode) => Ok(*mode),
            HashMode::Named(name) => {
                let name = name.trim().to_lowercase();
                if let Ok(mode) = name.parse() {
                    return Ok(mode);
                }
                preset_mode(&name).ok_or_else(|| {
                    ScanError::invalid_input(format!("Unknown hash type: {}", name))
                })
            }
        }
    }
}

fn preset_mode(name: &str) -> Option<u32> {
    match name {
        "md5" => Some(0),
        "sha1" => Some(100),
        "md4" => Some(900),
        "ntlm" => Some(1000),
        "sha256" => Some(1400),
        "sha512" => Some(1700),
        "md5crypt" => Some(500),
        "bcrypt" => Some(3200),
        "sha256crypt" => Some(7400),
        "sha512crypt" => Some(1800),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum HashcatRequest {
    Crack(CrackRequest),
    CrackMd5(PresetCrack),
    CrackNtlm(PresetCrack),
    CrackSha1(PresetCrack),
    CrackSha256(PresetCrack),
    Benchmark(BenchmarkRequest),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrackRequest {
    #[serde(default)]
    pub hash_file: String,
    #[serde(default)]
    pub wordlist: Option<String>,
    #[serde(default)]
    pub hash_type: Option<HashMode>,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetCrack {
    #[serde(default)]
    pub hash_file: String,
    #[serde(default)]
    pub wordlist: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BenchmarkRequest {
    #[serde(default)]
    pub hash_type: Option<HashMode>,
}

struct CrackPlan<'a> {
    mode: u32,
    hash_file: &'a str,
    wordlist: Option<&'a str>,
    options: &'a [String],
}

impl HashcatRequest {
    fn crack_plan(&self) -> Result<Option<CrackPlan<'_>>, ScanError> {
        fn preset(mode: u32, p: &PresetCrack) -> CrackPlan<'_> {
            CrackPlan {
                mode,
                hash_file: &p.hash_file,
                wordlist: p.wordlist.as_deref(),
                options: &[],
            }
        }
        Ok(Some(match self {
            HashcatRequest::Crack(c) => CrackPlan {
                mode: c.hash_type.as_ref().map(HashMode::resolve).transpose()?.unwrap_or(0),
                hash_file: &c.hash_file,
                wordlist: c.wordlist.as_deref(),
                options: &c.options,
            },
            HashcatRequest::CrackMd5(p) => preset(0, p),
            HashcatRequest::CrackNtlm(p) => preset(1000, p),
            HashcatRequest::CrackSha1(p) => preset(100, p),
            HashcatRequest::CrackSha256(p) => preset(1400, p),
            HashcatRequest::Benchmark(_) => return Ok(None),
        }))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Hashcat;

impl ToolSpec for Hashcat {
    type Request = HashcatRequest;

    fn name(&self) -> &'static str {
        "hashcat"
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape::LineText
    }

    fn timeout(&self, request: &HashcatRequest) -> Duration {
        match request {
            HashcatRequest::Benchmark(_) => Duration::from_secs(120),
            _ => Duration::from_secs(600),
        }
    }

    fn artifact_suffix(&self, request: &HashcatRequest) -> Option<&'static str> {
        match request {
            HashcatRequest::Benchmark(_) => None,
            _ => Some(".out"),
        }
    }

    fn command(
        &self,
        request: &HashcatRequest,
        ctx: &BuildContext<'_>,
    ) -> Result<CommandBuilder, ScanError> {
        let Some(plan) = request.crack_plan()? else {
            let mut options = vec!["-b".to_string()];
            if let HashcatRequest::Benchmark(bench) = request {
                if let Some(mode) = bench.hash_type.as_ref().map(HashMode::resolve).transpose()? {
                    options.extend(["-m".to_string(), mode.to_string()]);
                }
            }
            return Ok(ctx.command().target_optional().base(options).mandate("--quiet"));
        };

        let hash_file = plan.hash_file.trim();
        if hash_file.is_empty() {
            return Err(ScanError::missing_input(
                "No hash file specified for hashcat scan.",
            ));
        }
        if !Path::new(hash_file).is_file() {
            return Err(ScanError::invalid_input(format!(
                "Hash file not found: {}",
                hash_file
            )));
        }
        let wordlist = ctx.wordlist_or(plan.wordlist, DEFAULT_WORDLIST);
        if !Path::new(&wordlist).is_file() {
            return Err(ScanError::invalid_input(format!(
                "Wordlist not found: {}",
                wordlist
            )));
        }

        Ok(ctx
            .command()
            .base(["-m".to_string(), plan.mode.to_string(), "-a".to_string(), "0".to_string()])
            .placement(TargetPlacement::Positional)
            .target_label("hash file")
            .targets([hash_file.to_string(), wordlist])
            .options(plan.options.iter().cloned())
            .mandate("--potfile-disable")
            .mandate("--quiet")
            .mandate_with("-o", ctx.artifact_arg()?)
            .mandate_with("--outfile-format", "1,2")
            .conflicts(OUTPUT_CONFLICTS))
    }

    fn parse(
        &self,
        request: &HashcatRequest,
        outcome: &ExecutionOutcome,
        artifact: Option<&ScratchArtifact>,
    ) -> Result<ParsedOutput, ScanError> {
        if let HashcatRequest::Benchmark(_) = request {
            let text = strip_ansi(&outcome.stdout);
            let speeds = parse_benchmark(&text);
            let mut output = ParsedOutput::new(raw_output(&text));
            if !speeds.is_empty() {
                output = output.with_metadata("speeds", Value::Array(speeds));
            }
            return Ok(output);
        }

        let mut records = parse_cracked(&outcome.stdout);
        if let Some(contents) = artifact.and_then(ScratchArtifact::contents) {
            records.extend(parse_cracked(&contents));
        }
        let mut output = ParsedOutput::new(records).dedup();

        if let Some(plan) = request.crack_plan().ok().flatten() {
            output = output.with_metadata("hash_type", plan.mode);
        }
        let status = match outcome.exit_code {
            Some(0) if output.records.is_empty() => Some("completed"),
            Some(0) => Some("cracked"),
            Some(EXIT_EXHAUSTED) => Some("exhausted"),
            _ => None,
        };
        if let Some(status) = status {
            output = output.with_metadata("status", status);
        }
        Ok(output)
    }

    fn benign_exit_codes(&self) -> &'static [i32] {
        &[EXIT_EXHAUSTED]
    }
}

impl Catalogued for Hashcat {
    fn description(&self) -> &'static str {
        "GPU-accelerated password hash cracking"
    }

    fn variants(&self) -> Vec<VariantInfo> {
        let preset = |algo: &str| {
            json!({
                "type": "object",
                "properties": {
                    "hash_file": {"type": "string", "description": format!("File containing {} hashes, one per line", algo)},
                    "wordlist": {"type": "string", "description": "Wordlist path (default rockyou.txt)"}
                },
                "required": ["hash_file"]
            })
        };
        vec![
            VariantInfo::new(
                "crack",
                "Dictionary attack against a file of hashes. Returns cracked hash/password pairs; an exhausted keyspace is reported as status=exhausted.",
                json!({
                    "type": "object",
                    "properties": {
                        "hash_file": {"type": "string", "description": "File containing hashes, one per line"},
                        "wordlist": {"type": "string", "description": "Wordlist path (default rockyou.txt)"},
                        "hash_type": {
                            "oneOf": [{"type": "integer"}, {"type": "string"}],
                            "description": "Hashcat mode number or name (md5, ntlm, sha1, sha256, sha512, bcrypt, ...). Default 0 (MD5)"
                        },
                        "options": options_schema("[\"-r\", \"rules/best64.rule\"]")
                    },
                    "required": ["hash_file"]
                }),
            ),
            VariantInfo::new("crack_md5", "Crack MD5 hashes (mode 0).", preset("MD5")),
            VariantInfo::new("crack_ntlm", "Crack NTLM hashes (mode 1000).", preset("NTLM")),
            VariantInfo::new("crack_sha1", "Crack SHA1 hashes (mode 100).", preset("SHA1")),
            VariantInfo::new("crack_sha256", "Crack SHA256 hashes (mode 1400).", preset("SHA256")),
            VariantInfo::new(
                "benchmark",
                "Run the hashcat benchmark, optionally for a single hash mode.",
                json!({
                    "type": "object",
                    "properties": {
                        "hash_type": {
                            "oneOf": [{"type": "integer"}, {"type": "string"}],
                            "description": "Limit the benchmark to one mode"
                        }
                    }
                }),
            ),
        ]
    }
}

/// `hash:password` lines; status and diagnostic lines are skipped
pub fn parse_cracked(text: &str) -> Vec<NormalizedRecord> {
    let text = strip_ansi(text);
    parse_lines(&text, |line| {
        if line.starts_with('[') || line.starts_with('*') {
            return None;
        }
        let (hash, password) = line.split_once(':')?;
        if hash.is_empty() || hash.contains(char::is_whitespace) || hash.contains("..") {
            return None;
        }
        Some(NormalizedRecord::CrackedHash(CrackedHash {
            hash: hash.to_string(),
            password: password.to_string(),
        }))
    })
}

fn parse_benchmark(text: &str) -> Vec<Value> {
    let mut speeds = Vec::new();
    let mut mode = None;
    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Hashmode:") {
            mode = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Speed.") {
            if let Some((device, speed)) = rest.split_once(':') {
                let device = device.trim_end_matches('.').trim();
                let speed = speed.trim();
                let speed = speed.split(" (").next().unwrap_or(speed);
                speeds.push(json!({
                    "hash_mode": mode,
                    "device": device,
                    "speed": speed,
                }));
            }
        }
    }
    speeds
}

/// A candidate algorithm for a hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashCandidate {
    pub name: &'static str,
    pub mode: u32,
}

const fn candidate(name: &'static str, mode: u32) -> HashCandidate {
    HashCandidate { name, mode }
}

/// Guess likely hashcat modes from the shape of a hash. No process is run.
pub fn identify_hash(hash: &str) -> Vec<HashCandidate> {
    let hash = hash.trim();
    if hash.starts_with("$2a$") || hash.starts_with("$2b$") || hash.starts_with("$2y$") {
        return vec![candidate("bcrypt", 3200)];
    }
    if hash.starts_with("$1$") {
        return vec![candidate("md5crypt", 500)];
    }
    if hash.starts_with("$5$") {
        return vec![candidate("sha256crypt", 7400)];
    }
    if hash.starts_with("$6$") {
        return vec![candidate("sha512crypt", 1800)];
    }
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Vec::new();
    }
    match hash.len() {
        32 => vec![
            candidate("MD5", 0),
            candidate("NTLM", 1000),
            candidate("MD4", 900),
        ],
        40 => vec![candidate("SHA1", 100)],
        64 => vec![candidate("SHA256", 1400)],
        128 => vec![candidate("SHA512", 1700)],
        _ => Vec::new(),
    }
}

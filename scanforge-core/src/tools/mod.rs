//! Wrapped security tools and the catalogue that exposes them

pub mod crackmapexec;
pub mod dnsrecon;
pub mod enum4linux;
pub mod feroxbuster;
pub mod gobuster;
pub mod hashcat;
pub mod linpeas;
pub mod nikto;
pub mod nmap;
pub mod nuclei;
mod registry;

pub use registry::{ToolAvailability, ToolRegistry};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::invocation::{ScanEngine, ToolSpec};
use crate::parsers::OutputShape;
use crate::records::ScanResult;

/// One callable mode of a tool (e.g. gobuster `dir` vs `dns`)
#[derive(Debug, Clone, Serialize)]
pub struct VariantInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

impl VariantInfo {
    pub fn new(name: &'static str, description: &'static str, input_schema: Value) -> Self {
        Self {
            name,
            description,
            input_schema,
        }
    }
}

/// Descriptive half of a tool definition
pub trait Catalogued: ToolSpec {
    fn description(&self) -> &'static str;

    fn variants(&self) -> Vec<VariantInfo>;
}

/// Object-safe view of a tool, taking JSON arguments
#[async_trait]
pub trait ScanTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn binary(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn output_shape(&self) -> OutputShape;

    fn variants(&self) -> Vec<VariantInfo>;

    /// Deserialize `args` for `variant` and run it
    async fn run_json(&self, engine: &ScanEngine, variant: &str, args: Value) -> ScanResult;
}

#[async_trait]
impl<T> ScanTool for T
where
    T: Catalogued + 'static,
    T::Request: serde::de::DeserializeOwned,
{
    fn name(&self) -> &'static str {
        ToolSpec::name(self)
    }

    fn binary(&self) -> &'static str {
        self.default_binary()
    }

    fn description(&self) -> &'static str {
        Catalogued::description(self)
    }

    fn output_shape(&self) -> OutputShape {
        ToolSpec::output_shape(self)
    }

    fn variants(&self) -> Vec<VariantInfo> {
        Catalogued::variants(self)
    }

    async fn run_json(&self, engine: &ScanEngine, variant: &str, args: Value) -> ScanResult {
        let tool = ToolSpec::name(self);
        if !Catalogued::variants(self).iter().any(|v| v.name == variant) {
            return ScanResult::error(tool, format!("Unknown {} variant: {}", tool, variant));
        }

        let mut args = match args {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map,
            other => {
                return ScanResult::error(
                    tool,
                    format!("Arguments must be a JSON object, got {}", other),
                )
            }
        };
        args.insert("variant".to_string(), Value::String(variant.to_string()));

        match serde_json::from_value::<T::Request>(Value::Object(args)) {
            Ok(request) => engine.run(self, &request).await,
            Err(e) => ScanResult::error(tool, format!("Invalid arguments for {}: {}", tool, e)),
        }
    }
}

#[allow(clippy::expect_used)]
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("Hardcoded ANSI escape pattern should be valid")
});

/// Remove terminal colour codes
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Split an option string the way a shell would, honouring quotes
pub fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_token = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_token = true;
                }
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }
    args
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Options given either as a list or as a single shell-style string
pub fn deserialize_options<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => split_args(&s),
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Targets given either as a list or as a comma/space separated string
pub fn deserialize_targets<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(OneOrMany::Many(v)) => v,
    })
}

/// JSON schema fragment shared by every variant's `options` property
pub(crate) fn options_schema(example: &str) -> Value {
    serde_json::json!({
        "oneOf": [
            {"type": "array", "items": {"type": "string"}},
            {"type": "string"}
        ],
        "description": format!("Additional command-line options (e.g. {})", example)
    })
}

//! Configuration for scanforge

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cap on captured bytes per stream (10MB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10_485_760;

/// Per-tool overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Binary to execute instead of the tool's default name
    #[serde(default)]
    pub binary: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Default wordlist for tools that take one
    #[serde(default)]
    pub wordlist: Option<PathBuf>,
}

/// Process runner limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// How long to wait for pipes to drain after killing a timed-out child
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}

fn default_kill_grace_ms() -> u64 {
    1000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: default_max_output_bytes(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

impl RunnerConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// HackerOne API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HackerOneConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Bugcrowd API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BugcrowdConfig {
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    #[serde(default)]
    pub hackerone: HackerOneConfig,
    #[serde(default)]
    pub bugcrowd: BugcrowdConfig,
}

/// Complete scanforge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanforgeConfig {
    #[serde(default)]
    pub tools: HashMap<String, ToolSettings>,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
}

impl ScanforgeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from default locations with cascade:
    /// 1. ./scanforge.toml (local override)
    /// 2. ~/.scanforge/config.toml (global defaults)
    /// 3. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(config) = Self::from_file("scanforge.toml") {
            return config;
        }

        if let Some(global_path) = Self::global_config_path() {
            if let Ok(config) = Self::from_file(&global_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".scanforge").join("config.toml"))
    }

    /// Settings for a tool, or defaults when the config has no section for it
    pub fn tool(&self, name: &str) -> ToolSettings {
        self.tools.get(name).cloned().unwrap_or_default()
    }

    /// Expand `${VAR}` references and fill missing platform credentials from
    /// the process environment
    pub fn resolve_env(&mut self) {
        self.resolve_with(|name| std::env::var(name).ok());
    }

    fn resolve_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let h1 = &mut self.platforms.hackerone;
        expand_var(&mut h1.username, &lookup);
        expand_var(&mut h1.api_token, &lookup);
        fill_missing(&mut h1.username, "HACKERONE_USERNAME", &lookup);
        fill_missing(&mut h1.api_token, "HACKERONE_API_TOKEN", &lookup);

        let bc = &mut self.platforms.bugcrowd;
        expand_var(&mut bc.api_token, &lookup);
        fill_missing(&mut bc.api_token, "BUGCROWD_API_TOKEN", &lookup);
    }
}

fn expand_var<F>(value: &mut Option<String>, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(current) = value.as_deref() {
        if let Some(var_name) = current
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            *value = lookup(var_name).filter(|v| !v.is_empty());
        }
    }
}

fn fill_missing<F>(value: &mut Option<String>, var_name: &str, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if value.as_deref().map_or(true, str::is_empty) {
        *value = lookup(var_name).filter(|v| !v.is_empty());
    }
}

/// Optional feature set, decided once at startup from resolved configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub hackerone: bool,
    pub bugcrowd: bool,
}

impl Capabilities {
    pub fn from_config(config: &ScanforgeConfig) -> Self {
        let h1 = &config.platforms.hackerone;
        Self {
            hackerone: h1.username.is_some() && h1.api_token.is_some(),
            bugcrowd: config.platforms.bugcrowd.api_token.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = ScanforgeConfig::parse("").unwrap();
        assert!(config.tools.is_empty());
        assert_eq!(config.runner.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
        assert_eq!(config.runner.kill_grace(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_tool_overrides() {
        let toml = r#"
[tools.gobuster]
binary = "/opt/gobuster/bin/gobuster"
timeout_secs = 60
wordlist = "/srv/wordlists/small.txt"

[runner]
max_output_bytes = 1024
"#;
        let config = ScanforgeConfig::parse(toml).unwrap();
        let gobuster = config.tool("gobuster");
        assert_eq!(
            gobuster.binary.as_deref(),
            Some("/opt/gobuster/bin/gobuster")
        );
        assert_eq!(gobuster.timeout_secs, Some(60));
        assert_eq!(
            gobuster.wordlist,
            Some(PathBuf::from("/srv/wordlists/small.txt"))
        );
        assert_eq!(config.runner.max_output_bytes, 1024);

        let nmap = config.tool("nmap");
        assert!(nmap.binary.is_none());
    }

    #[test]
    fn test_env_var_expansion() {
        let toml = r#"
[platforms.hackerone]
username = "hunter"
api_token = "${H1_TOKEN}"
"#;
        let mut config = ScanforgeConfig::parse(toml).unwrap();
        config.resolve_with(env(&[("H1_TOKEN", "expanded_value")]));
        assert_eq!(
            config.platforms.hackerone.api_token.as_deref(),
            Some("expanded_value")
        );
        assert!(Capabilities::from_config(&config).hackerone);
    }

    #[test]
    fn test_unset_env_reference_disables_platform() {
        let toml = r#"
[platforms.bugcrowd]
api_token = "${MISSING_TOKEN}"
"#;
        let mut config = ScanforgeConfig::parse(toml).unwrap();
        config.resolve_with(env(&[]));
        assert!(config.platforms.bugcrowd.api_token.is_none());
        assert!(!Capabilities::from_config(&config).bugcrowd);
    }

    #[test]
    fn test_credentials_fall_back_to_environment() {
        let mut config = ScanforgeConfig::default();
        config.resolve_with(env(&[
            ("HACKERONE_USERNAME", "hunter"),
            ("HACKERONE_API_TOKEN", "tok"),
            ("BUGCROWD_API_TOKEN", "bc"),
        ]));
        let caps = Capabilities::from_config(&config);
        assert!(caps.hackerone);
        assert!(caps.bugcrowd);
    }

    #[test]
    fn test_hackerone_requires_both_credentials() {
        let mut config = ScanforgeConfig::default();
        config.resolve_with(env(&[("HACKERONE_API_TOKEN", "tok")]));
        assert!(!Capabilities::from_config(&config).hackerone);
    }

    #[test]
    fn test_global_config_path() {
        if let Some(path) = ScanforgeConfig::global_config_path() {
            assert!(path.ends_with(".scanforge/config.toml"));
        }
    }
}

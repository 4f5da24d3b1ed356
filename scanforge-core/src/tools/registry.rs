//! Catalogue of built-in tools and their availability on this host

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::crackmapexec::Crackmapexec;
use super::dnsrecon::Dnsrecon;
use super::enum4linux::Enum4linux;
use super::feroxbuster::Feroxbuster;
use super::gobuster::Gobuster;
use super::hashcat::Hashcat;
use super::linpeas::Linpeas;
use super::nikto::Nikto;
use super::nmap::Nmap;
use super::nuclei::Nuclei;
use super::{ScanTool, VariantInfo};
use crate::config::ScanforgeConfig;

/// Whether a tool's binary can be launched here
#[derive(Debug, Clone, Serialize)]
pub struct ToolAvailability {
    pub name: &'static str,
    pub binary: String,
    /// Resolved location, `None` when not found
    pub path: Option<PathBuf>,
}

impl ToolAvailability {
    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

/// Registry of all wrapped tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ScanTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

impl ToolRegistry {
    /// Every tool this crate knows how to drive
    pub fn builtin() -> Self {
        let tools: Vec<Arc<dyn ScanTool>> = vec![
            Arc::new(Nmap),
            Arc::new(Gobuster),
            Arc::new(Feroxbuster),
            Arc::new(Dnsrecon),
            Arc::new(Enum4linux),
            Arc::new(Hashcat),
            Arc::new(Nikto),
            Arc::new(Nuclei),
            Arc::new(Crackmapexec),
            Arc::new(Linpeas),
        ];
        Self { tools }
    }

    pub fn all(&self) -> &[Arc<dyn ScanTool>] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScanTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Resolve a flattened `{tool}_{variant}` name such as `gobuster_dir`
    pub fn find(&self, qualified: &str) -> Option<(Arc<dyn ScanTool>, VariantInfo)> {
        self.tools.iter().find_map(|tool| {
            let variant = qualified
                .strip_prefix(tool.name())?
                .strip_prefix('_')?;
            tool.variants()
                .into_iter()
                .find(|v| v.name == variant)
                .map(|v| (Arc::clone(tool), v))
        })
    }

    /// Locate each tool's binary, honouring configured overrides
    pub fn availability(&self, config: &ScanforgeConfig) -> Vec<ToolAvailability> {
        self.tools
            .iter()
            .map(|tool| {
                let binary = config
                    .tool(tool.name())
                    .binary
                    .unwrap_or_else(|| tool.binary().to_string());
                let path = which::which(&binary).ok();
                if path.is_none() {
                    tracing::debug!(tool = tool.name(), binary = %binary, "Binary not found");
                }
                ToolAvailability {
                    name: tool.name(),
                    binary,
                    path,
                }
            })
            .collect()
    }
}

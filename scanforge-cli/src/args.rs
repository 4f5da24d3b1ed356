//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "scanforge")]
#[command(author, version, about = "Uniform wrappers around external security tools")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve every tool over MCP on stdin/stdout
    Serve,

    /// Run a single tool once and print its JSON result
    Call {
        /// Tool name as listed by `tools` (e.g. gobuster_dir, hashcat_identify)
        tool: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// List tools and whether their binaries are installed
    Tools {
        /// Print the full MCP tool definitions as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    /// Default log directive for the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// peerinit - dependency-ordered peer bring-up
#[derive(Parser)]
#[command(
    name = "pi",
    about = "Bring up cross-origin peers in dependency order",
    version,
    after_help = "Logs are written to: ~/.local/share/peerinit/logs/peerinit.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Check a topology file without running it
    Check {
        /// Topology file (YAML)
        #[arg(value_name = "TOPOLOGY")]
        topology: PathBuf,
    },

    /// Bring a topology up with simulated peers
    Run {
        /// Topology file (YAML)
        #[arg(value_name = "TOPOLOGY")]
        topology: PathBuf,

        /// Override the per-peer timeout in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for run results
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

//! peerinit - dependency-ordered peer bring-up
//!
//! CLI entry point for checking and running peer topologies.

use std::fs;
use std::path::Path;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tracing::info;

use peerinit::cli::{Cli, Command, OutputFormat};
use peerinit::config::{Config, log_dir};
use peerinit::sim::{RunReport, run_topology};
use peerinit::topology::Topology;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("peerinit.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging first so config fallbacks are recorded
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        timeout_ms = config.coordinator.timeout_ms,
        safety_check_interval_ms = config.coordinator.safety_check_interval_ms,
        "peerinit loaded config"
    );

    match cli.command {
        Command::Check { topology } => cmd_check(&topology),
        Command::Run {
            topology,
            timeout_ms,
            format,
        } => cmd_run(&config, &topology, timeout_ms, format).await,
    }
}

/// Validate a topology and print its registration order
fn cmd_check(path: &Path) -> Result<()> {
    let topology = Topology::load(path)?;

    println!("Topology OK: {} peer(s), trusted origin {}", topology.peers.len(), topology.own_origin);
    for (index, peer) in topology.peers.iter().enumerate() {
        if peer.depends_on.is_empty() {
            println!("  {}. {} ({})", index + 1, peer.name.bold(), peer.origin);
        } else {
            println!(
                "  {}. {} ({}) after {}",
                index + 1,
                peer.name.bold(),
                peer.origin,
                peer.depends_on.join(", ")
            );
        }
    }
    Ok(())
}

/// Bring a topology up with simulated peers
async fn cmd_run(config: &Config, path: &Path, timeout_ms: Option<u64>, format: OutputFormat) -> Result<()> {
    let mut topology = Topology::load(path)?;
    if timeout_ms.is_some() {
        topology.timeout_ms = timeout_ms;
    }

    info!(peers = topology.peers.len(), "Running topology {}", path.display());
    let report = run_topology(&topology, &config.coordinator).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    if report.all_succeeded() {
        Ok(())
    } else {
        let failed: Vec<&str> = report.failed().map(|p| p.name.as_str()).collect();
        Err(eyre!("{} peer(s) failed: {}", failed.len(), failed.join(", ")))
    }
}

fn print_report(report: &RunReport) {
    println!("Peers");
    println!("-----");
    for peer in &report.peers {
        let status = if peer.success {
            "initialized".green()
        } else {
            "failed".red()
        };
        println!(
            "  {:<8} {:<20} {:<12} {:>6}ms  {}",
            peer.id.to_string(),
            peer.name,
            status,
            peer.elapsed_ms,
            peer.origin
        );
    }

    let m = &report.metrics;
    println!();
    println!("Metrics");
    println!("-------");
    println!("  registered:          {}", m.registered_peers);
    println!("  initialized:         {}", m.initialized_peers);
    println!("  failed:              {}", m.failed_peers);
    println!("  timeouts:            {}", m.timeouts);
    println!("  cascaded failures:   {}", m.cascaded_failures);
    println!("  safety checks:       {}", m.safety_checks);
    println!("  protocol violations: {}", m.protocol_violations);
    println!("  messages in/out:     {}/{}", m.messages_received, m.messages_sent);
}

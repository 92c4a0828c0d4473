// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use stigmergy_core::domain::node_config::{NodeConfigManifest, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./stigmergy-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, force } => generate(&output, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = NodeConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./stigmergy-config.yaml");
        println!("  4. ~/.stigmergy/config.yaml");
        println!("  5. /etc/stigmergy/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Agent:".bold());
    println!("  ID: {}", spec.agent.id);
    println!("  Region: {}", spec.agent.region);
    match spec.agent.role {
        Some(role) => println!("  Role: {}", role),
        None => println!("  Role: {}", "(not set)".dimmed()),
    }
    println!();

    println!("{}", "Store:".bold());
    println!("  URL: {}", spec.store.url);
    println!("  Logs: {}:<region>, {}:<region>", spec.streams.warning_prefix, spec.streams.alert_prefix);
    println!("  Retention: ~{} events", spec.streams.retention);
    println!();

    println!("{}", "Sensor:".bold());
    println!("  Threshold: {}", spec.sensor.threshold);
    println!("  Poll: {}ms, neighbor window: {}ms", spec.sensor.poll_interval_ms, spec.sensor.neighbor_window_ms);
    println!();

    println!("{}", "Aggregator:".bold());
    println!("  Quorum ratio: {}", spec.aggregator.quorum_ratio);
    match spec.aggregator.total_sensors {
        Some(total) => println!("  Total sensors: {}", total),
        None => println!("  Total sensors: {}", "(from registry)".dimmed()),
    }
    println!("  Poll: {}ms, window: {}ms", spec.aggregator.poll_interval_ms, spec.aggregator.sliding_window_ms);
    println!();

    println!("{}", "Responder:".bold());
    println!("  Isolation: {}ms, scan: {}ms", spec.responder.isolation_ms, spec.responder.scan_ms);
    println!("  Lock TTL: {}ms", spec.responder.lock_ttl_ms);
    println!();

    println!("{}", "Simulator:".bold());
    println!("  Enabled: {}", spec.simulator.enabled);
    println!();

    println!("{}", "Network:".bold());
    println!("  Control API: {}:{}", spec.network.bind_address, spec.network.port);
    if spec.observability.metrics.enabled {
        println!("  Metrics: :{}", spec.observability.metrics.port);
    }

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = NodeConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", output.display());
    }

    NodeConfigManifest::default()
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());
    Ok(())
}

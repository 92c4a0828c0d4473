// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Stigmergy CLI
//!
//! The `stigmergy` binary runs swarm agents and talks to running nodes.
//!
//! ## Commands
//!
//! - `stigmergy run [--role ROLE]` - start agents, control API and dashboard stream
//! - `stigmergy store serve|stats` - host or inspect the shared store
//! - `stigmergy config show|validate|generate` - configuration management
//! - `stigmergy trigger|feedback|health` - control API client

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use stigmergy_cli::commands::{self, ConfigCommand, ControlCommand, RoleArg, StoreCommand};
use stigmergy_core::domain::node_config::NodeConfigManifest;

/// Stigmergy - decentralized anomaly detection and response
#[derive(Parser)]
#[command(name = "stigmergy")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "STIGMERGY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level or filter directive, overridden by RUST_LOG (default: spec.observability.logging.level)
    #[arg(long, global = true, env = "STIGMERGY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log line format (default: spec.observability.logging.format)
    #[arg(long, global = true, env = "STIGMERGY_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// Control API of the node targeted by client commands
    #[arg(long, global = true, env = "STIGMERGY_API_URL", default_value = "http://127.0.0.1:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run agents for a role
    #[command(name = "run")]
    Run {
        /// Role to run (default: spec.agent.role)
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
    },

    /// Shared store server
    #[command(name = "store")]
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    #[command(flatten)]
    Control(ControlCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // load failures resurface with context once the command loads its config
    let logging = NodeConfigManifest::load_or_default(cli.config.clone())
        .map(|config| config.spec.observability.logging)
        .unwrap_or_default();
    let level = cli.log_level.clone().unwrap_or(logging.level);
    let format = cli.log_format.unwrap_or(if logging.format.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });
    init_logging(&level, format)?;

    match cli.command {
        Some(Commands::Run { role }) => commands::run::execute(role, cli.config).await,
        Some(Commands::Store { command }) => commands::store::handle_command(command).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Control(command)) => commands::control::handle_command(command, &cli.api_url).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.with_target(false).compact().init(),
        LogFormat::Json => builder.json().with_current_span(false).init(),
    }

    Ok(())
}

// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Shared store commands
//!
//! Commands: serve, stats

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use stigmergy_core::domain::store::StoreHealth;
use stigmergy_core::infrastructure::http_store::HttpStore;
use stigmergy_core::infrastructure::in_memory_store::InMemoryStore;
use stigmergy_core::presentation::store_api;

use crate::node::shutdown_signal;

#[derive(Subcommand)]
pub enum StoreCommand {
    /// Host the shared log, lease and registry store for agents in other processes
    Serve {
        /// Address to bind
        #[arg(long, env = "STIGMERGY_STORE_BIND", default_value = "0.0.0.0:6380")]
        bind: String,
    },

    /// Show figures from a running store server
    Stats {
        /// Store server URL
        #[arg(long, env = "STIGMERGY_STORE_URL", default_value = "http://127.0.0.1:6380")]
        url: String,
    },
}

pub async fn handle_command(command: StoreCommand) -> Result<()> {
    match command {
        StoreCommand::Serve { bind } => serve(bind).await,
        StoreCommand::Stats { url } => stats(url).await,
    }
}

async fn serve(bind: String) -> Result<()> {
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Store server listening on {}", bind);

    axum::serve(listener, store_api::router(InMemoryStore::new()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Store server failed")?;

    info!("Store server stopped");
    Ok(())
}

async fn stats(url: String) -> Result<()> {
    let store = HttpStore::new(&url, Duration::from_secs(5)).context("Invalid store URL")?;
    let stats = store
        .stats()
        .await
        .with_context(|| format!("Failed to reach store at {}", url))?;

    println!("{}", format!("Store at {}", url).bold());
    println!("  Memory:  {}", stats.used_memory_display());
    println!("  Streams: {}", stats.streams);
    println!("  Events:  {}", stats.events);
    println!("  Leases:  {}", stats.leases);
    Ok(())
}

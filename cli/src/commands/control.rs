// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Commands that talk to a running node's control API
//!
//! Commands: trigger, feedback, health

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::Colorize;

use stigmergy_core::domain::feedback::FeedbackType;

use crate::node::ControlClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedbackArg {
    FalsePositive,
    TruePositive,
}

impl From<FeedbackArg> for FeedbackType {
    fn from(value: FeedbackArg) -> Self {
        match value {
            FeedbackArg::FalsePositive => FeedbackType::FalsePositive,
            FeedbackArg::TruePositive => FeedbackType::TruePositive,
        }
    }
}

#[derive(Subcommand)]
pub enum ControlCommand {
    /// Inject a manual anomaly
    Trigger {
        /// Target region (default: the node's region)
        #[arg(long)]
        region: Option<String>,
    },

    /// Tell a sensor whether one of its detections was real
    Feedback {
        #[arg(long)]
        agent_id: String,

        #[arg(long)]
        detection_id: String,

        #[arg(long = "type", value_enum)]
        feedback_type: FeedbackArg,
    },

    /// Check node and store health
    Health,
}

pub async fn handle_command(command: ControlCommand, api_url: &str) -> Result<()> {
    let client = ControlClient::new(api_url)?;

    match command {
        ControlCommand::Trigger { region } => {
            let region = client.trigger(region.as_deref()).await?;
            println!("{}", format!("✓ Anomaly triggered in {}", region).green());
        }
        ControlCommand::Feedback {
            agent_id,
            detection_id,
            feedback_type,
        } => {
            let feedback_type = FeedbackType::from(feedback_type).to_string();
            let delivered = client.feedback(&agent_id, &detection_id, &feedback_type).await?;
            if delivered == 0 {
                println!(
                    "{}",
                    format!("Feedback sent, but no sensor '{}' is listening", agent_id).yellow()
                );
            } else {
                println!("{}", format!("✓ Feedback delivered to {}", agent_id).green());
            }
        }
        ControlCommand::Health => {
            let report = client.health().await?;
            if report.is_healthy() {
                println!("{}", format!("✓ Node at {} is healthy", client.base_url()).green());
                if let Some(region) = &report.region {
                    println!("  Region: {}", region);
                }
                if let Some(store) = &report.store {
                    println!("  Store memory: {}", store.used_memory);
                    println!("  Streams: {}, events: {}, leases: {}", store.streams, store.events, store.leases);
                }
            } else {
                println!("{}", format!("✗ Node at {} is unhealthy", client.base_url()).red());
                if let Some(error) = &report.error {
                    println!("  Error: {}", error);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

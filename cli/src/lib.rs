// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Stigmergy CLI library - exposes testable components
//!
//! - [`commands`]: clap subcommands and their handlers
//! - [`node`]: process wiring for agents, control API and shutdown

pub mod commands;
pub mod node;

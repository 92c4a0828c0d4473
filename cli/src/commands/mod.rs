// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Stigmergy CLI

pub mod config;
pub mod control;
pub mod run;
pub mod store;

pub use self::config::ConfigCommand;
pub use self::control::ControlCommand;
pub use self::run::RoleArg;
pub use self::store::StoreCommand;

// Copyright (c) 2026 Stigmergy Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`stigmergy-core`)
//!
//! HTTP surfaces built on axum. **No detection or remediation logic lives
//! here**; handlers delegate to the store and application services.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP/SSE (Axum) | Control API plus the dashboard event stream, hosted by every agent |
//! | [`store_api`] | HTTP/SSE (Axum) | Shared store server used by agents in other processes |

pub mod api;
pub mod store_api;

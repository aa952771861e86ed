// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kato API - Regional Control-Plane Gateway
//!
//! The gateway sits between the web console and the region's backend
//! subsystems. It translates console intent into durable records plus
//! queued tasks, and aggregates live status back from the runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Web Console                             │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │ HTTP (bearer token)
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       kato-api (this crate)                     │
//! │   auth ──▶ handler ──▶ event ledger ──▶ engine ──▶ repository   │
//! │                              │                                  │
//! │                              └──▶ task queue (event id out)     │
//! └─────────────────────────────────────────────────────────────────┘
//!       │                    │                        │
//!       ▼                    ▼                        ▼
//! ┌───────────┐       ┌─────────────┐         ┌──────────────────┐
//! │ PostgreSQL │      │ redis queue │         │ runtime (gRPC)   │
//! │ kato-store │      │   kato-mq   │         │   kato-runtime   │
//! └───────────┘       └─────────────┘         └──────────────────┘
//! ```
//!
//! Every state-changing operation that completes asynchronously opens an
//! event in the ledger before its task is enqueued; the admission gate
//! serializes async operations per target, and the timeout sweeper
//! finalizes events abandoned by crashed workers.
//!
//! # Event state machine
//!
//! ```text
//!  (none) --create--> Open --close(<400)----> Closed/success
//!                        \--close(>=400)---> Closed/failure
//!                        \--sweep(expired)-> Closed/timeout
//! ```
//!
//! # Modules
//!
//! - [`config`]: environment-variable configuration
//! - [`error`]: the typed API error surfaced as `{code, msg}` JSON
//! - [`registry`]: the injected dependency bundle (no global singletons)
//! - [`events`]: event ledger, admission gate, timeout sweeper
//! - [`operations`]: component operation orchestrator (build/start/...)
//! - [`ingress`]: HTTP/TCP gateway rule engine
//! - [`plugins`]: plugin attachment engine
//! - [`auth`]: token cache, token/cert dispatchers, license seam
//! - [`admin`]: tenant lifecycle, volume-type catalog, bootstrap seeds
//! - [`server`]: axum router
//! - [`handlers`]: HTTP request handlers

#![deny(missing_docs)]

/// Environment-variable configuration.
pub mod config;

/// Typed API error with HTTP mapping.
pub mod error;

/// Injected dependency bundle.
pub mod registry;

/// Event ledger, admission gate, and timeout sweeper.
pub mod events;

/// Component operation orchestrator.
pub mod operations;

/// Gateway rule engine.
pub mod ingress;

/// Plugin attachment engine.
pub mod plugins;

/// Token cache and dispatchers.
pub mod auth;

/// Tenant and catalog administration.
pub mod admin;

/// Router construction.
pub mod server;

/// HTTP handlers.
pub mod handlers;

pub use error::{ApiError, Result};
pub use registry::Registry;

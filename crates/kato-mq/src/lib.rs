// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kato MQ - Task Dispatch Fabric
//!
//! The wire contract between the gateway and the worker fleet. The
//! gateway serializes one [`envelope::TaskEnvelope`] per asynchronous
//! operation and pushes it onto the topic's queue; workers pop, execute,
//! and report back through the event ledger's close path. Publication is
//! at-least-once and consumers key on the event id carried in the task
//! body.
//!
//! The same connection also backs the ephemeral keyspace ([`kv`]):
//! net-rule snapshots and service-check results that the data plane and
//! workers exchange outside the relational store.
//!
//! # Modules
//!
//! - [`envelope`]: the task envelope and the topic / task-kind vocabularies
//! - [`queue`]: the publisher trait and the redis-backed queue
//! - [`kv`]: the ephemeral key/value store
//! - [`error`]: error type

#![deny(missing_docs)]

/// Error type.
pub mod error;

/// Task envelope and routing vocabularies.
pub mod envelope;

/// Publisher trait and redis queue.
pub mod queue;

/// Ephemeral key/value store.
pub mod kv;

pub use envelope::{TaskEnvelope, TaskKind, TaskMessage, Topic};
pub use error::{MqError, Result};
pub use queue::{RedisTaskQueue, TaskPublisher};

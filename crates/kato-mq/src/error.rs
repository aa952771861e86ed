// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for kato-mq.

use thiserror::Error;

/// Queue and keyspace errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MqError {
    /// Redis operation failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Envelope serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using MqError.
pub type Result<T> = std::result::Result<T, MqError>;

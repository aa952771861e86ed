// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for kato-runtime.

use thiserror::Error;

/// Runtime client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// Channel construction or connection failed.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The runtime answered with a gRPC error status.
    #[error("rpc error: {0}")]
    Status(#[from] tonic::Status),

    /// The call's deadline elapsed.
    #[error("deadline elapsed after {0:?}")]
    Deadline(std::time::Duration),

    /// TLS material could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No endpoints were configured.
    #[error("no runtime endpoints configured")]
    NoEndpoints,
}

/// Result type using RuntimeError.
pub type Result<T> = std::result::Result<T, RuntimeError>;

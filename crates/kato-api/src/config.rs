// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the gateway server.

use std::net::SocketAddr;
use std::path::PathBuf;

use kato_runtime::RuntimeConfig;

/// Default bootstrap token when `TOKEN` is unset.
pub const DEFAULT_TOKEN: &str = "defaulttokentoken";

/// Gateway configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Redis connection string (queue + ephemeral keyspace).
    pub redis_url: String,
    /// HTTP listen address.
    pub api_addr: SocketAddr,
    /// Bootstrap bearer token, seeded with all-power scope.
    pub token: String,
    /// Region name, stamped into dispatched tokens.
    pub region_name: String,
    /// Whether windows build hosts exist in this region.
    pub enable_windows_builder: bool,
    /// Region CA certificate path, for issuing client certificates.
    pub region_ca_file: Option<PathBuf>,
    /// Region CA key path, paired with the certificate.
    pub region_ca_key_file: Option<PathBuf>,
    /// Runtime synchronizer connection settings.
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("KATO_DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("KATO_DATABASE_URL"))?;

        let redis_url =
            std::env::var("KATO_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

        let port: u16 = std::env::var("KATO_API_PORT")
            .unwrap_or_else(|_| "8888".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;
        let api_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let token = std::env::var("TOKEN").unwrap_or_else(|_| DEFAULT_TOKEN.to_string());

        let region_name = std::env::var("KATO_REGION_NAME").unwrap_or_else(|_| "kato".to_string());

        let enable_windows_builder = std::env::var("KATO_ENABLE_WINDOWS_BUILDER")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let region_ca_file = std::env::var("KATO_REGION_CA").ok().map(PathBuf::from);
        let region_ca_key_file = std::env::var("KATO_REGION_CA_KEY").ok().map(PathBuf::from);

        let endpoints = std::env::var("KATO_RUNTIME_ENDPOINTS")
            .unwrap_or_else(|_| "http://127.0.0.1:6535".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let runtime = RuntimeConfig {
            endpoints,
            ca_file: std::env::var("KATO_RUNTIME_CA").ok().map(PathBuf::from),
            cert_file: std::env::var("KATO_RUNTIME_CERT").ok().map(PathBuf::from),
            key_file: std::env::var("KATO_RUNTIME_KEY").ok().map(PathBuf::from),
        };

        Ok(Self {
            database_url,
            redis_url,
            api_addr,
            token,
            region_name,
            enable_windows_builder,
            region_ca_file,
            region_ca_key_file,
            runtime,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
}

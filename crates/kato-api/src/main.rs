// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kato API - Regional Gateway Server
//!
//! Wires the registry (store, queue, runtime client, caches, engines),
//! seeds bootstrap state, starts the event timeout sweeper, and serves
//! the HTTP surface until interrupted.

use std::sync::Arc;

use tracing::{info, warn};

use kato_api::auth::dispatch::CertDispatcher;
use kato_api::config::Config;
use kato_api::events::sweeper::{EventSweeper, SweeperConfig};
use kato_api::registry::Registry;
use kato_api::{admin, server};
use kato_mq::RedisTaskQueue;
use kato_mq::kv::EphemeralKv;
use kato_runtime::StatusClient;
use kato_store::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kato_api=info,kato_store=info,kato_mq=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        api_addr = %config.api_addr,
        region = %config.region_name,
        "Starting Kato regional gateway"
    );

    // Connect to the database and run migrations
    let store = Arc::new(PostgresStore::connect(&config.database_url).await?);
    info!("Connected to database");

    // Connect to the queue; the ephemeral keyspace shares the connection
    let queue = RedisTaskQueue::connect(&config.redis_url).await?;
    let kv = EphemeralKv::new(queue.connection());
    info!("Connected to task queue");

    // Runtime synchronizer channel (lazy; degrades until reachable)
    let runtime = StatusClient::connect(&config.runtime).await?;

    // Region CA for certificate issuance, when configured
    let cert_dispatcher = match (&config.region_ca_file, &config.region_ca_key_file) {
        (Some(ca), Some(key)) => {
            let ca_pem = tokio::fs::read_to_string(ca).await?;
            let key_pem = tokio::fs::read_to_string(key).await?;
            Some(CertDispatcher::new(ca_pem, key_pem))
        }
        _ => None,
    };

    let registry = Arc::new(Registry::new(
        config.clone(),
        store.clone(),
        Arc::new(queue),
        kv,
        runtime,
        cert_dispatcher,
    ));

    // Seed bootstrap state: api classes, protocol catalog, tokens
    admin::bootstrap_defaults(registry.store.as_ref()).await?;
    registry.token_cache.seed_bootstrap(&config.token);
    registry.token_cache.init_token_map().await?;

    // Start the event timeout sweeper
    let sweeper = EventSweeper::new(registry.store.clone(), SweeperConfig::default());
    let sweeper_shutdown = sweeper.shutdown_handle();
    let sweeper_task = tokio::spawn(async move { sweeper.run().await });

    // Serve until interrupted
    let app = server::build_router(registry);
    let listener = tokio::net::TcpListener::bind(config.api_addr).await?;
    info!(addr = %config.api_addr, "Gateway ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Graceful shutdown
    sweeper_shutdown.notify_one();
    let _ = sweeper_task.await;

    info!("Kato regional gateway shut down");

    Ok(())
}

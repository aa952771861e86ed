// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background worker for finalizing abandoned events.
//!
//! Async events that are still open past their timeout window are
//! finalized with `timeout`. This covers workers that crash without
//! reporting back: the admission gate also times out stale events
//! lazily on the next operation attempt, but the sweeper keeps the
//! ledger honest for targets nobody touches again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use kato_store::repo::{EventStore, Store};

use super::timeout_window;
use crate::error::Result;

/// Configuration for the event sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often to scan for expired events.
    pub poll_interval: Duration,
    /// Maximum open events examined per sweep.
    pub batch_limit: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_limit: 500,
        }
    }
}

/// Background worker that finalizes expired events.
pub struct EventSweeper {
    store: Arc<dyn Store>,
    config: SweeperConfig,
    shutdown: Arc<Notify>,
}

impl EventSweeper {
    /// Create a new sweeper.
    pub fn new(store: Arc<dyn Store>, config: SweeperConfig) -> Self {
        Self {
            store,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the sweeper loop until shutdown is signalled.
    pub async fn run(&self) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Event sweeper started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Event sweeper received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    match self.sweep_expired().await {
                        Ok(0) => debug!("No expired events found"),
                        Ok(count) => info!(count, "Finalized expired events"),
                        Err(e) => error!(error = %e, "Failed to sweep expired events"),
                    }
                }
            }
        }

        info!("Event sweeper stopped");
    }

    /// One sweep pass. Returns how many events were finalized.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let open = self
            .store
            .list_unfinalized_async(self.config.batch_limit)
            .await?;

        let mut finalized = 0u64;
        for event in open {
            let window = timeout_window(&event.opt_type);
            let elapsed = now.signed_duration_since(event.start_time);
            if elapsed < chrono::Duration::from_std(window).expect("window fits") {
                continue;
            }
            match self
                .store
                .finalize_event(&event.event_id, None, "timeout", now)
                .await
            {
                Ok(()) => {
                    debug!(
                        event_id = %event.event_id,
                        target = %event.target,
                        target_id = %event.target_id,
                        opt_type = %event.opt_type,
                        "Finalized expired event"
                    );
                    finalized += 1;
                }
                Err(e) => {
                    error!(event_id = %event.event_id, error = %e, "Failed to finalize event");
                }
            }
        }

        Ok(finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use kato_store::memory::MemoryStore;
    use kato_store::repo::EventStore;
    use kato_store::types::EventRecord;
    use uuid::Uuid;

    fn event(opt_type: &str, syn_type: &str, start_time: DateTime<Utc>) -> EventRecord {
        EventRecord {
            event_id: Uuid::new_v4().to_string(),
            tenant_id: "t1".to_string(),
            target: "service".to_string(),
            target_id: Uuid::new_v4().to_string(),
            opt_type: opt_type.to_string(),
            syn_type: syn_type.to_string(),
            user_name: "ops".to_string(),
            start_time,
            end_time: None,
            request_body: String::new(),
            status: String::new(),
            final_status: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sweep_finalizes_only_expired() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        // Expired: build opened four minutes ago (window is three).
        let expired = event("build", "async", now - chrono::Duration::minutes(4));
        let expired_id = expired.event_id.clone();
        store.create_event(&expired).await.unwrap();

        // Expired: stop opened a minute ago (window is thirty seconds).
        let expired_short = event("stop", "async", now - chrono::Duration::minutes(1));
        store.create_event(&expired_short).await.unwrap();

        // Fresh: build opened one minute ago.
        let fresh = event("build", "async", now - chrono::Duration::minutes(1));
        let fresh_id = fresh.event_id.clone();
        store.create_event(&fresh).await.unwrap();

        // Sync events are never swept.
        let sync = event("build", "sync", now - chrono::Duration::minutes(10));
        let sync_id = sync.event_id.clone();
        store.create_event(&sync).await.unwrap();

        let sweeper = EventSweeper::new(store.clone(), SweeperConfig::default());
        let count = sweeper.sweep_expired().await.unwrap();
        assert_eq!(count, 2);

        assert_eq!(
            store.get_event(&expired_id).await.unwrap().unwrap().final_status,
            "timeout"
        );
        assert_eq!(
            store.get_event(&fresh_id).await.unwrap().unwrap().final_status,
            ""
        );
        assert_eq!(
            store.get_event(&sync_id).await.unwrap().unwrap().final_status,
            ""
        );
    }
}

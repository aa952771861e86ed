// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cross-module flow tests: orchestrator, ledger, and sweeper working
//! against one store, the way a request sequence hits them in
//! production. Runs on the in-memory backend; no external services.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use kato_api::error::ApiError;
use kato_api::events::sweeper::{EventSweeper, SweeperConfig};
use kato_api::events::{EventLedger, OpType};
use kato_api::operations::Orchestrator;
use kato_mq::{TaskEnvelope, TaskPublisher};
use kato_store::memory::MemoryStore;
use kato_store::repo::{ComponentStore, EventStore};
use kato_store::types::ComponentRecord;

#[derive(Default)]
struct RecordingPublisher {
    sent: Mutex<Vec<TaskEnvelope>>,
}

#[async_trait]
impl TaskPublisher for RecordingPublisher {
    async fn publish(&self, envelope: &TaskEnvelope) -> kato_mq::Result<()> {
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

fn component(service_id: &str) -> ComponentRecord {
    ComponentRecord {
        service_id: service_id.to_string(),
        tenant_id: "t1".to_string(),
        app_id: String::new(),
        service_alias: format!("gr{service_id}"),
        kind: "internal".to_string(),
        deploy_version: "v1".to_string(),
        replicas: 1,
        container_memory: 512,
        container_cpu: 250,
        extend_method: "stateless".to_string(),
        os_type: "linux".to_string(),
        node_selector: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    ledger: EventLedger,
    orchestrator: Orchestrator,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let ledger = EventLedger::new(store.clone());
    let orchestrator = Orchestrator::new(store.clone(), publisher, ledger.clone(), false);
    store.create_component(&component("s1")).await.unwrap();
    Fixture {
        store,
        ledger,
        orchestrator,
    }
}

#[tokio::test]
async fn test_operation_blocks_until_worker_reports() {
    let f = fixture().await;

    // First operation opens an event and occupies the target.
    let result = f.orchestrator.lifecycle(OpType::Stop, "s1", "ops").await.unwrap();
    assert_eq!(result.status, "success");

    // A second operation on the same target is rejected while the
    // first is in flight.
    let err = f
        .orchestrator
        .lifecycle(OpType::Start, "s1", "ops")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::OperationInProgress));

    // The worker reports completion through the close path.
    f.ledger.close_event(&result.event_id, 200).await.unwrap();

    // The target is free again.
    let result = f.orchestrator.lifecycle(OpType::Start, "s1", "ops").await.unwrap();
    assert_eq!(result.operation, "start");
}

#[tokio::test]
async fn test_abandoned_target_unblocks_after_window() {
    let f = fixture().await;

    // A worker died mid-operation: an open async stop event, aged past
    // its thirty-second window.
    let stale = kato_store::types::EventRecord {
        event_id: "stale-1".to_string(),
        tenant_id: "t1".to_string(),
        target: "service".to_string(),
        target_id: "s1".to_string(),
        opt_type: "stop".to_string(),
        syn_type: "async".to_string(),
        user_name: "ops".to_string(),
        start_time: Utc::now() - chrono::Duration::minutes(2),
        end_time: None,
        request_body: String::new(),
        status: String::new(),
        final_status: String::new(),
    };
    f.store.create_event(&stale).await.unwrap();

    // The sweeper finalizes it.
    let sweeper = EventSweeper::new(f.store.clone(), SweeperConfig::default());
    assert_eq!(sweeper.sweep_expired().await.unwrap(), 1);
    let swept = f.store.get_event("stale-1").await.unwrap().unwrap();
    assert_eq!(swept.final_status, "timeout");

    // The target admits the next operation.
    let result = f.orchestrator.lifecycle(OpType::Start, "s1", "ops").await.unwrap();
    assert_eq!(result.status, "success");
}

#[tokio::test]
async fn test_sweeper_pass_counts_only_expired() {
    let store = Arc::new(MemoryStore::new());
    let sweeper = EventSweeper::new(store.clone(), SweeperConfig::default());

    // Nothing to sweep on an empty ledger.
    assert_eq!(sweeper.sweep_expired().await.unwrap(), 0);
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event ledger and admission gate.
//!
//! The ledger is the single source of truth for "is an operation in
//! flight on X". Every async operation opens an event before its task
//! is enqueued and is closed when the worker reports or the sweeper
//! times it out. The admission gate serializes async operations per
//! (target, target-id) without any distributed lock: concurrent
//! operators race on the latest-event read, and a crashed worker can
//! never wedge a target past its timeout window.

pub mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use kato_store::repo::{EventStore, Store};
use kato_store::types::EventRecord;

use crate::error::{ApiError, Result};

/// Request bodies recorded on events are truncated to this many bytes.
const MAX_REQUEST_BODY: usize = 1024;

/// How many times a close write is retried on persistence error.
const CLOSE_RETRIES: u32 = 3;

/// Operation type of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    /// Build an artifact.
    Build,
    /// Start a component.
    Start,
    /// Stop a component.
    Stop,
    /// Restart a component.
    Restart,
    /// Upgrade to a new deploy version.
    Upgrade,
    /// Roll back to an earlier deploy version.
    Rollback,
    /// First deploy of a component.
    Deploy,
    /// Create a resource.
    Create,
    /// Tear down a tenant.
    DeleteTenant,
    /// Update a plugin attachment.
    UpdatePluginConfig,
}

impl OpType {
    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Build => "build",
            OpType::Start => "start",
            OpType::Stop => "stop",
            OpType::Restart => "restart",
            OpType::Upgrade => "upgrade",
            OpType::Rollback => "rollback",
            OpType::Deploy => "deploy",
            OpType::Create => "create",
            OpType::DeleteTenant => "delete-tenant",
            OpType::UpdatePluginConfig => "update-plugin-config",
        }
    }
}

/// Whether an operation completes in-request or via a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynType {
    /// Completes before the response is written; never gated.
    Sync,
    /// Completed later by a worker; subject to the admission gate.
    Async,
}

impl SynType {
    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SynType::Sync => "sync",
            SynType::Async => "async",
        }
    }
}

/// Target kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A tenant.
    Tenant,
    /// A component.
    Service,
    /// A gateway port.
    Port,
}

impl Target {
    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Tenant => "tenant",
            Target::Service => "service",
            Target::Port => "port",
        }
    }
}

/// Timeout window after which an open async event no longer blocks its
/// target. Long-running operations get three minutes, everything else
/// thirty seconds.
pub fn timeout_window(opt_type: &str) -> Duration {
    match opt_type {
        "deploy" | "create" | "build" | "upgrade" => Duration::from_secs(180),
        _ => Duration::from_secs(30),
    }
}

/// Outcome of evaluating the gate against the latest event of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// No blocking event; admit.
    Admit,
    /// The blocking event has exceeded its window; admit and finalize
    /// the stale event with `timeout`.
    AdmitAfterTimeout,
    /// An operation is in flight; reject.
    Reject,
}

/// Pure admission core. `latest` is the most recent event for the
/// (target, target-id) pair; `now` is injected so the decision is
/// deterministic under test.
pub fn evaluate(
    latest: Option<&EventRecord>,
    syn_type: SynType,
    now: DateTime<Utc>,
) -> AdmissionDecision {
    if syn_type == SynType::Sync {
        return AdmissionDecision::Admit;
    }
    let Some(latest) = latest else {
        return AdmissionDecision::Admit;
    };
    if latest.is_finalized() {
        return AdmissionDecision::Admit;
    }
    let window = timeout_window(&latest.opt_type);
    let elapsed = now.signed_duration_since(latest.start_time);
    if elapsed >= chrono::Duration::from_std(window).expect("window fits") {
        AdmissionDecision::AdmitAfterTimeout
    } else {
        AdmissionDecision::Reject
    }
}

/// Parameters for opening an event.
#[derive(Debug, Clone)]
pub struct OpenEvent {
    /// Tenant the operation belongs to.
    pub tenant_id: String,
    /// Target kind.
    pub target: Target,
    /// Target id within the kind.
    pub target_id: String,
    /// Operation type.
    pub opt_type: OpType,
    /// Sync or async.
    pub syn_type: SynType,
    /// Initiating user.
    pub user_name: String,
    /// Original request body; truncated to 1024 bytes on record.
    pub request_body: String,
}

/// The event ledger.
#[derive(Clone)]
pub struct EventLedger {
    store: Arc<dyn Store>,
}

impl EventLedger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Admission check for a new operation. When the blocking event has
    /// timed out it is finalized here, in the same call.
    #[instrument(skip(self), fields(target = target.as_str(), opt_type = opt_type.as_str()))]
    pub async fn can_do_event(
        &self,
        opt_type: OpType,
        syn_type: SynType,
        target: Target,
        target_id: &str,
    ) -> Result<bool> {
        if syn_type == SynType::Sync {
            return Ok(true);
        }
        let latest = self.store.latest_event(target.as_str(), target_id).await?;
        match evaluate(latest.as_ref(), syn_type, Utc::now()) {
            AdmissionDecision::Admit => Ok(true),
            AdmissionDecision::AdmitAfterTimeout => {
                let stale = latest.expect("timeout decision implies an event");
                info!(
                    event_id = %stale.event_id,
                    target_id,
                    "Finalizing timed-out event before admitting new operation"
                );
                self.store
                    .finalize_event(&stale.event_id, None, "timeout", Utc::now())
                    .await?;
                Ok(true)
            }
            AdmissionDecision::Reject => Ok(false),
        }
    }

    /// Open an event. Generates the event id and stamps the start time.
    pub async fn create_event(&self, open: OpenEvent) -> Result<EventRecord> {
        let event = EventRecord {
            event_id: Uuid::new_v4().to_string(),
            tenant_id: open.tenant_id,
            target: open.target.as_str().to_string(),
            target_id: open.target_id,
            opt_type: open.opt_type.as_str().to_string(),
            syn_type: open.syn_type.as_str().to_string(),
            user_name: open.user_name,
            start_time: Utc::now(),
            end_time: None,
            request_body: truncate_body(&open.request_body),
            status: String::new(),
            final_status: String::new(),
        };
        self.store.create_event(&event).await?;
        Ok(event)
    }

    /// Gate and open in one step. Returns the opened event, or
    /// [`ApiError::OperationInProgress`] when the gate rejects.
    pub async fn open_gated(&self, open: OpenEvent) -> Result<EventRecord> {
        if !self
            .can_do_event(open.opt_type, open.syn_type, open.target, &open.target_id)
            .await?
        {
            return Err(ApiError::OperationInProgress);
        }
        self.create_event(open).await
    }

    /// Close an event from an HTTP outcome: success below 400, failure
    /// otherwise. The write is retried on persistence errors.
    pub async fn close_event(&self, event_id: &str, http_status: u16) -> Result<()> {
        let status = if http_status < 400 { "success" } else { "failure" };
        let end_time = Utc::now();
        let mut last_err = None;
        for attempt in 1..=CLOSE_RETRIES {
            match self
                .store
                .finalize_event(event_id, Some(status), "complete", end_time)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(event_id, attempt, error = %e, "Failed to close event");
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        Err(last_err.expect("retry loop ran").into())
    }
}

/// Truncate a request body to the recorded maximum, respecting char
/// boundaries.
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_REQUEST_BODY {
        return body.to_string();
    }
    let mut end = MAX_REQUEST_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kato_store::memory::MemoryStore;

    fn open_async_event(opt_type: &str, start_time: DateTime<Utc>) -> EventRecord {
        EventRecord {
            event_id: Uuid::new_v4().to_string(),
            tenant_id: "t1".to_string(),
            target: "service".to_string(),
            target_id: "S".to_string(),
            opt_type: opt_type.to_string(),
            syn_type: "async".to_string(),
            user_name: "ops".to_string(),
            start_time,
            end_time: None,
            request_body: String::new(),
            status: String::new(),
            final_status: String::new(),
        }
    }

    #[test]
    fn test_timeout_windows() {
        for op in ["deploy", "create", "build", "upgrade"] {
            assert_eq!(timeout_window(op), Duration::from_secs(180));
        }
        for op in ["start", "stop", "restart", "rollback", "delete-tenant"] {
            assert_eq!(timeout_window(op), Duration::from_secs(30));
        }
    }

    #[test]
    fn test_evaluate_sync_always_admits() {
        let now = Utc::now();
        let blocking = open_async_event("build", now);
        assert_eq!(
            evaluate(Some(&blocking), SynType::Sync, now),
            AdmissionDecision::Admit
        );
    }

    #[test]
    fn test_evaluate_no_event_admits() {
        assert_eq!(evaluate(None, SynType::Async, Utc::now()), AdmissionDecision::Admit);
    }

    #[test]
    fn test_evaluate_finalized_admits() {
        let now = Utc::now();
        let mut done = open_async_event("build", now);
        done.final_status = "complete".to_string();
        assert_eq!(
            evaluate(Some(&done), SynType::Async, now),
            AdmissionDecision::Admit
        );
    }

    #[test]
    fn test_evaluate_open_event_rejects_within_window() {
        let t0 = Utc::now();
        let blocking = open_async_event("build", t0);
        // Two minutes in: still inside the three-minute build window.
        let now = t0 + chrono::Duration::minutes(2);
        assert_eq!(
            evaluate(Some(&blocking), SynType::Async, now),
            AdmissionDecision::Reject
        );
    }

    #[test]
    fn test_evaluate_expired_event_admits_with_timeout() {
        let t0 = Utc::now();
        let blocking = open_async_event("build", t0);
        let now = t0 + chrono::Duration::minutes(3) + chrono::Duration::seconds(1);
        assert_eq!(
            evaluate(Some(&blocking), SynType::Async, now),
            AdmissionDecision::AdmitAfterTimeout
        );
    }

    #[test]
    fn test_evaluate_short_window_for_other_ops() {
        let t0 = Utc::now();
        let blocking = open_async_event("stop", t0);
        let now = t0 + chrono::Duration::seconds(31);
        assert_eq!(
            evaluate(Some(&blocking), SynType::Async, now),
            AdmissionDecision::AdmitAfterTimeout
        );
    }

    #[tokio::test]
    async fn test_admission_gate_finalizes_stale_event() {
        let store = Arc::new(MemoryStore::new());
        let ledger = EventLedger::new(store.clone());

        // Stale build event opened well past its window.
        let stale = open_async_event("build", Utc::now() - chrono::Duration::minutes(4));
        let stale_id = stale.event_id.clone();
        kato_store::repo::EventStore::create_event(store.as_ref(), &stale)
            .await
            .unwrap();

        let admitted = ledger
            .can_do_event(OpType::Build, SynType::Async, Target::Service, "S")
            .await
            .unwrap();
        assert!(admitted);

        let finalized = kato_store::repo::EventStore::get_event(store.as_ref(), &stale_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(finalized.final_status, "timeout");
    }

    #[tokio::test]
    async fn test_admission_gate_rejects_open_event() {
        let store = Arc::new(MemoryStore::new());
        let ledger = EventLedger::new(store.clone());

        let blocking = open_async_event("build", Utc::now() - chrono::Duration::minutes(2));
        kato_store::repo::EventStore::create_event(store.as_ref(), &blocking)
            .await
            .unwrap();

        let admitted = ledger
            .can_do_event(OpType::Build, SynType::Async, Target::Service, "S")
            .await
            .unwrap();
        assert!(!admitted);
    }

    #[tokio::test]
    async fn test_close_event_maps_http_status() {
        let store = Arc::new(MemoryStore::new());
        let ledger = EventLedger::new(store.clone());

        let event = ledger
            .create_event(OpenEvent {
                tenant_id: "t1".to_string(),
                target: Target::Service,
                target_id: "S".to_string(),
                opt_type: OpType::Start,
                syn_type: SynType::Async,
                user_name: "ops".to_string(),
                request_body: String::new(),
            })
            .await
            .unwrap();

        ledger.close_event(&event.event_id, 200).await.unwrap();
        let closed = kato_store::repo::EventStore::get_event(store.as_ref(), &event.event_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.status, "success");
        assert_eq!(closed.final_status, "complete");
        assert!(closed.end_time.is_some());
    }

    #[test]
    fn test_truncate_body() {
        let short = "x".repeat(100);
        assert_eq!(truncate_body(&short), short);

        let long = "x".repeat(4096);
        assert_eq!(truncate_body(&long).len(), MAX_REQUEST_BODY);

        // Multi-byte characters never split.
        let wide = "é".repeat(1024);
        let truncated = truncate_body(&wide);
        assert!(truncated.len() <= MAX_REQUEST_BODY);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}

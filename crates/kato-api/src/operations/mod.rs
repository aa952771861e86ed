// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Component operation orchestrator.
//!
//! Accepts build, start, stop, restart, upgrade, and rollback requests,
//! runs them through the admission gate, persists the records the
//! worker will need, and enqueues one task per operation. Publication
//! is at-least-once and never retried here: a failed enqueue closes the
//! event as failure, undoes any deploy-version transition, and reports
//! the failure verbatim so the console can retry.

pub mod source;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use kato_mq::{TaskEnvelope, TaskKind, TaskPublisher, Topic};
use kato_store::repo::{ComponentStore, Store};
use kato_store::types::{BuildVersionRecord, ComponentRecord};

use crate::error::{ApiError, Result};
use crate::events::{EventLedger, OpType, OpenEvent, SynType, Target};
use self::source::{BuildSourceSpec, build_topic};

/// Outcome of one orchestrated operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    /// Component the operation targeted.
    pub service_id: String,
    /// Operation name.
    pub operation: String,
    /// Ledger event opened for the operation (empty when none was).
    pub event_id: String,
    /// `success` when the task was enqueued, `failure` otherwise.
    pub status: String,
    /// Failure detail, empty on success.
    pub err_message: String,
    /// Deploy version after the operation.
    pub deploy_version: String,
}

/// Build request.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRequest {
    /// Component to build.
    pub service_id: String,
    /// Initiating user.
    #[serde(default)]
    pub user: String,
    /// Build source fields.
    pub source: BuildSourceSpec,
    /// Plan version the build runs under.
    #[serde(default)]
    pub plan_version: Option<String>,
}

/// Upgrade / rollback request.
#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeRequest {
    /// Component to transition.
    pub service_id: String,
    /// Target build version; must exist with `success` status.
    pub upgrade_version: String,
    /// Initiating user.
    #[serde(default)]
    pub user: String,
}

/// One item of a batch operation.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchOperationItem {
    /// Component to operate on.
    pub service_id: String,
    /// Operation name (`start`, `stop`, `restart`, `upgrade`, `build`).
    pub operation: String,
    /// Target build version for `upgrade`.
    #[serde(default)]
    pub build_version: Option<String>,
    /// Build source for `build`.
    #[serde(default)]
    pub source: Option<BuildSourceSpec>,
}

/// Source-check request: inspect a build source before a component
/// exists for it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceCheckRequest {
    /// Source kind (`docker-run`, `docker-compose`, `sourcecode`, ...).
    pub source_type: String,
    /// Source payload (run command, compose body, repository url).
    pub source_body: String,
    /// Initiating user.
    #[serde(default)]
    pub user: String,
}

/// Source-check handle returned to the console.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCheckResult {
    /// Key under which the worker stores the check result.
    pub check_uuid: String,
}

/// The orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    publisher: Arc<dyn TaskPublisher>,
    ledger: EventLedger,
    windows_enabled: bool,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn TaskPublisher>,
        ledger: EventLedger,
        windows_enabled: bool,
    ) -> Self {
        Self {
            store,
            publisher,
            ledger,
            windows_enabled,
        }
    }

    /// Load a component and reject targets the fabric cannot operate.
    async fn load_operable(&self, service_id: &str) -> Result<ComponentRecord> {
        let component = self
            .store
            .get_component(service_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("component".to_string()))?;
        if component.is_third_party() {
            return Err(ApiError::Validation(
                "third-party component does not support this operation".to_string(),
            ));
        }
        Ok(component)
    }

    /// Enqueue; on failure close the event as failed and surface the
    /// error verbatim.
    async fn publish_or_fail(&self, envelope: TaskEnvelope, event_id: &str) -> Result<()> {
        if let Err(e) = self.publisher.publish(&envelope).await {
            error!(event_id, error = %e, "Task enqueue failed");
            if let Err(close_err) = self.ledger.close_event(event_id, 500).await {
                error!(event_id, error = %close_err, "Failed to close event after enqueue failure");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Enqueue a build. Synthesizes the new deploy version, records the
    /// build version in `building` state, and routes to the builder
    /// fleet.
    #[instrument(skip(self, request), fields(service_id = %request.service_id))]
    pub async fn build(&self, request: BuildRequest) -> Result<OperationResult> {
        let component = self.load_operable(&request.service_id).await?;
        // Required fields fail before anything is persisted.
        let source = request.source.validate()?;

        let event = self
            .ledger
            .open_gated(OpenEvent {
                tenant_id: component.tenant_id.clone(),
                target: Target::Service,
                target_id: component.service_id.clone(),
                opt_type: OpType::Build,
                syn_type: SynType::Async,
                user_name: request.user.clone(),
                request_body: serde_json::to_string(&request.source)?,
            })
            .await?;

        let deploy_version = Utc::now().format("%Y%m%d%H%M%S").to_string();
        self.store
            .create_build_version(&BuildVersionRecord {
                service_id: component.service_id.clone(),
                build_version: deploy_version.clone(),
                status: "building".to_string(),
                delivered_type: Some(source.delivered_type().to_string()),
                delivered_path: None,
                finish_time: None,
                plan_version: request.plan_version.clone(),
                repo_url: source.repo_url().map(str::to_string),
                branch: source.branch().map(str::to_string),
                commit_hash: None,
                commit_msg: None,
                author: request.user.clone(),
                cmd: request.source.cmd.clone(),
                created_at: Utc::now(),
            })
            .await?;

        let topic = build_topic(
            self.windows_enabled,
            component.node_selector.as_deref(),
            source.kind_str(),
            "",
        );
        let envelope = TaskEnvelope::new(
            topic,
            TaskKind::Build,
            json!({
                "event_id": event.event_id,
                "tenant_id": component.tenant_id,
                "service_id": component.service_id,
                "service_alias": component.service_alias,
                "deploy_version": deploy_version,
                "source": request.source,
            }),
            request.user,
            Utc::now(),
        );
        self.publish_or_fail(envelope, &event.event_id).await?;

        info!(
            service_id = %component.service_id,
            deploy_version,
            topic = topic.as_str(),
            "Build dispatched"
        );
        Ok(operation_ok(&component.service_id, "build", &event.event_id, &deploy_version))
    }

    /// Enqueue a lifecycle operation (start / stop / restart).
    #[instrument(skip(self))]
    pub async fn lifecycle(
        &self,
        op: OpType,
        service_id: &str,
        user: &str,
    ) -> Result<OperationResult> {
        let kind = match op {
            OpType::Start => TaskKind::Start,
            OpType::Stop => TaskKind::Stop,
            OpType::Restart => TaskKind::Restart,
            _ => {
                return Err(ApiError::Validation(format!(
                    "'{}' is not a lifecycle operation",
                    op.as_str()
                )));
            }
        };
        let component = self.load_operable(service_id).await?;

        let event = self
            .ledger
            .open_gated(OpenEvent {
                tenant_id: component.tenant_id.clone(),
                target: Target::Service,
                target_id: component.service_id.clone(),
                opt_type: op,
                syn_type: SynType::Async,
                user_name: user.to_string(),
                request_body: String::new(),
            })
            .await?;

        let envelope = TaskEnvelope::new(
            Topic::Worker,
            kind,
            json!({
                "event_id": event.event_id,
                "tenant_id": component.tenant_id,
                "service_id": component.service_id,
                "deploy_version": component.deploy_version,
            }),
            user,
            Utc::now(),
        );
        self.publish_or_fail(envelope, &event.event_id).await?;

        Ok(operation_ok(
            &component.service_id,
            op.as_str(),
            &event.event_id,
            &component.deploy_version,
        ))
    }

    /// Upgrade to a target build version.
    pub async fn upgrade(&self, request: UpgradeRequest) -> Result<OperationResult> {
        self.roll(OpType::Upgrade, request).await
    }

    /// Roll back to an earlier build version.
    pub async fn rollback(&self, request: UpgradeRequest) -> Result<OperationResult> {
        self.roll(OpType::Rollback, request).await
    }

    /// Shared upgrade/rollback flow: verify the target version, move
    /// the deploy version, enqueue, and restore the anchor when the
    /// enqueue fails.
    #[instrument(skip(self, request), fields(service_id = %request.service_id, op = op.as_str()))]
    async fn roll(&self, op: OpType, request: UpgradeRequest) -> Result<OperationResult> {
        let component = self.load_operable(&request.service_id).await?;

        let target = self
            .store
            .get_build_version(&component.service_id, &request.upgrade_version)
            .await?
            .ok_or_else(|| ApiError::NotFound("build version".to_string()))?;
        if target.status != "success" {
            return Err(ApiError::Validation(format!(
                "build version '{}' is not a successful build",
                request.upgrade_version
            )));
        }

        let event = self
            .ledger
            .open_gated(OpenEvent {
                tenant_id: component.tenant_id.clone(),
                target: Target::Service,
                target_id: component.service_id.clone(),
                opt_type: op,
                syn_type: SynType::Async,
                user_name: request.user.clone(),
                request_body: format!("upgrade_version={}", request.upgrade_version),
            })
            .await?;

        // Anchor for the compensating write on enqueue failure.
        let rollback_anchor = component.deploy_version.clone();
        self.store
            .update_deploy_version(&component.service_id, &request.upgrade_version)
            .await?;

        let envelope = TaskEnvelope::new(
            Topic::Worker,
            TaskKind::RollingUpgrade,
            json!({
                "event_id": event.event_id,
                "tenant_id": component.tenant_id,
                "service_id": component.service_id,
                "current_deploy_version": rollback_anchor,
                "new_deploy_version": request.upgrade_version,
            }),
            request.user.clone(),
            Utc::now(),
        );
        if let Err(e) = self.publisher.publish(&envelope).await {
            error!(event_id = %event.event_id, error = %e, "Enqueue failed, restoring deploy version");
            if let Err(restore_err) = self
                .store
                .update_deploy_version(&component.service_id, &rollback_anchor)
                .await
            {
                error!(
                    service_id = %component.service_id,
                    error = %restore_err,
                    "Failed to restore deploy version after enqueue failure"
                );
            }
            if let Err(close_err) = self.ledger.close_event(&event.event_id, 500).await {
                error!(event_id = %event.event_id, error = %close_err, "Failed to close event");
            }
            return Err(e.into());
        }

        Ok(operation_ok(
            &component.service_id,
            op.as_str(),
            &event.event_id,
            &request.upgrade_version,
        ))
    }

    /// Run a batch sequentially in input order. Per-item failures are
    /// recorded in the result vector; the batch never aborts early.
    pub async fn batch(&self, items: Vec<BatchOperationItem>) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = self.run_batch_item(&item).await.unwrap_or_else(|e| {
                OperationResult {
                    service_id: item.service_id.clone(),
                    operation: item.operation.clone(),
                    event_id: String::new(),
                    status: "failure".to_string(),
                    err_message: e.to_string(),
                    deploy_version: String::new(),
                }
            });
            results.push(result);
        }
        results
    }

    async fn run_batch_item(&self, item: &BatchOperationItem) -> Result<OperationResult> {
        match item.operation.as_str() {
            "start" => self.lifecycle(OpType::Start, &item.service_id, "").await,
            "stop" => self.lifecycle(OpType::Stop, &item.service_id, "").await,
            "restart" => self.lifecycle(OpType::Restart, &item.service_id, "").await,
            "upgrade" => {
                let version = item.build_version.clone().ok_or_else(|| {
                    ApiError::Validation("build_version is required for upgrade".to_string())
                })?;
                self.upgrade(UpgradeRequest {
                    service_id: item.service_id.clone(),
                    upgrade_version: version,
                    user: String::new(),
                })
                .await
            }
            "build" => {
                let source = item.source.clone().ok_or_else(|| {
                    ApiError::Validation("source is required for build".to_string())
                })?;
                self.build(BuildRequest {
                    service_id: item.service_id.clone(),
                    user: String::new(),
                    source,
                    plan_version: None,
                })
                .await
            }
            other => Err(ApiError::Validation(format!(
                "unknown batch operation '{other}'"
            ))),
        }
    }

    /// Dispatch a source check. The worker writes its verdict under the
    /// returned check uuid in the ephemeral keyspace.
    #[instrument(skip(self, request))]
    pub async fn service_check(
        &self,
        tenant_id: &str,
        request: ServiceCheckRequest,
    ) -> Result<ServiceCheckResult> {
        if request.source_type.is_empty() {
            return Err(ApiError::Validation("source_type is required".to_string()));
        }
        if request.source_body.is_empty() {
            return Err(ApiError::Validation("source_body is required".to_string()));
        }

        let check_uuid = Uuid::new_v4().to_string();
        let topic = build_topic(
            self.windows_enabled,
            None,
            &request.source_type,
            &request.source_body,
        );
        let envelope = TaskEnvelope::new(
            topic,
            TaskKind::ServiceCheck,
            json!({
                "check_uuid": check_uuid,
                "tenant_id": tenant_id,
                "source_type": request.source_type,
                "source_body": request.source_body,
            }),
            request.user,
            Utc::now(),
        );
        self.publisher.publish(&envelope).await?;

        info!(check_uuid, topic = topic.as_str(), "Source check dispatched");
        Ok(ServiceCheckResult { check_uuid })
    }
}

fn operation_ok(
    service_id: &str,
    operation: &str,
    event_id: &str,
    deploy_version: &str,
) -> OperationResult {
    OperationResult {
        service_id: service_id.to_string(),
        operation: operation.to_string(),
        event_id: event_id.to_string(),
        status: "success".to_string(),
        err_message: String::new(),
        deploy_version: deploy_version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kato_mq::MqError;
    use kato_store::memory::MemoryStore;
    use kato_store::repo::ComponentStore;
    use std::sync::Mutex;

    /// Publisher that records envelopes and optionally fails.
    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<TaskEnvelope>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn sent(&self) -> Vec<TaskEnvelope> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskPublisher for RecordingPublisher {
        async fn publish(&self, envelope: &TaskEnvelope) -> kato_mq::Result<()> {
            if self.fail {
                return Err(publish_failure());
            }
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    fn publish_failure() -> MqError {
        MqError::Json(serde_json::from_str::<i32>("queue down").unwrap_err())
    }

    fn component(service_id: &str) -> ComponentRecord {
        ComponentRecord {
            service_id: service_id.to_string(),
            tenant_id: "t1".to_string(),
            app_id: "a1".to_string(),
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

    fn successful_build(service_id: &str, version: &str) -> BuildVersionRecord {
        BuildVersionRecord {
            service_id: service_id.to_string(),
            build_version: version.to_string(),
            status: "success".to_string(),
            delivered_type: Some("image".to_string()),
            delivered_path: Some("registry/app:v2".to_string()),
            finish_time: Some(Utc::now()),
            plan_version: None,
            repo_url: None,
            branch: None,
            commit_hash: None,
            commit_msg: None,
            author: "ops".to_string(),
            cmd: None,
            created_at: Utc::now(),
        }
    }

    async fn orchestrator_with(
        publisher: Arc<RecordingPublisher>,
    ) -> (Orchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = EventLedger::new(store.clone());
        let orchestrator = Orchestrator::new(store.clone(), publisher, ledger, true);
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_upgrade_moves_deploy_version() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, store) = orchestrator_with(publisher.clone()).await;
        store.create_component(&component("s1")).await.unwrap();
        store
            .create_build_version(&successful_build("s1", "v2"))
            .await
            .unwrap();

        let result = orchestrator
            .upgrade(UpgradeRequest {
                service_id: "s1".to_string(),
                upgrade_version: "v2".to_string(),
                user: "ops".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.status, "success");
        assert_eq!(result.deploy_version, "v2");
        let component = store.get_component("s1").await.unwrap().unwrap();
        assert_eq!(component.deploy_version, "v2");

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].task_type, TaskKind::RollingUpgrade);
        assert_eq!(sent[0].topic, Topic::Worker);
        assert_eq!(sent[0].message.task_body["current_deploy_version"], "v1");
    }

    #[tokio::test]
    async fn test_upgrade_restores_deploy_version_on_enqueue_failure() {
        let publisher = Arc::new(RecordingPublisher::failing());
        let (orchestrator, store) = orchestrator_with(publisher).await;
        store.create_component(&component("s1")).await.unwrap();
        store
            .create_build_version(&successful_build("s1", "v2"))
            .await
            .unwrap();

        let err = orchestrator
            .upgrade(UpgradeRequest {
                service_id: "s1".to_string(),
                upgrade_version: "v2".to_string(),
                user: "ops".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Downstream(_)));

        // Deploy version restored to the anchor.
        let component = store.get_component("s1").await.unwrap().unwrap();
        assert_eq!(component.deploy_version, "v1");

        // The event is closed as failure.
        let event = kato_store::repo::EventStore::latest_event(store.as_ref(), "service", "s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.status, "failure");
        assert_eq!(event.final_status, "complete");
    }

    #[tokio::test]
    async fn test_upgrade_rejects_unsuccessful_build() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, store) = orchestrator_with(publisher).await;
        store.create_component(&component("s1")).await.unwrap();
        let mut failed = successful_build("s1", "v2");
        failed.status = "failure".to_string();
        store.create_build_version(&failed).await.unwrap();

        let err = orchestrator
            .upgrade(UpgradeRequest {
                service_id: "s1".to_string(),
                upgrade_version: "v2".to_string(),
                user: "ops".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_build_records_building_version() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, store) = orchestrator_with(publisher.clone()).await;
        store.create_component(&component("s1")).await.unwrap();

        let result = orchestrator
            .build(BuildRequest {
                service_id: "s1".to_string(),
                user: "ops".to_string(),
                source: BuildSourceSpec {
                    source_type: "build_from_source_code".to_string(),
                    repo_url: Some("https://git.example.com/app.git".to_string()),
                    branch: Some("main".to_string()),
                    ..Default::default()
                },
                plan_version: None,
            })
            .await
            .unwrap();

        assert_eq!(result.status, "success");
        let version = store
            .get_build_version("s1", &result.deploy_version)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(version.status, "building");
        assert_eq!(version.branch.as_deref(), Some("main"));

        let sent = publisher.sent();
        assert_eq!(sent[0].topic, Topic::Builder);
        assert_eq!(sent[0].task_type, TaskKind::Build);
    }

    #[tokio::test]
    async fn test_build_rejects_missing_required_fields_before_persistence() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, store) = orchestrator_with(publisher).await;
        store.create_component(&component("s1")).await.unwrap();

        let err = orchestrator
            .build(BuildRequest {
                service_id: "s1".to_string(),
                user: "ops".to_string(),
                source: BuildSourceSpec {
                    source_type: "build_from_source_code".to_string(),
                    repo_url: Some("https://git.example.com/app.git".to_string()),
                    branch: None,
                    ..Default::default()
                },
                plan_version: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // Nothing persisted: no event opened for the target.
        let event = kato_store::repo::EventStore::latest_event(store.as_ref(), "service", "s1")
            .await
            .unwrap();
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_rejects_third_party() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, store) = orchestrator_with(publisher).await;
        let mut third = component("s1");
        third.kind = "third_party".to_string();
        store.create_component(&third).await.unwrap();

        let err = orchestrator
            .lifecycle(OpType::Start, "s1", "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_second_operation_rejected_while_first_open() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, store) = orchestrator_with(publisher).await;
        store.create_component(&component("s1")).await.unwrap();

        orchestrator
            .lifecycle(OpType::Stop, "s1", "ops")
            .await
            .unwrap();
        let err = orchestrator
            .lifecycle(OpType::Start, "s1", "ops")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::OperationInProgress));
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, store) = orchestrator_with(publisher).await;
        store.create_component(&component("s1")).await.unwrap();
        store.create_component(&component("s2")).await.unwrap();

        let results = orchestrator
            .batch(vec![
                BatchOperationItem {
                    service_id: "s1".to_string(),
                    operation: "stop".to_string(),
                    build_version: None,
                    source: None,
                },
                BatchOperationItem {
                    service_id: "missing".to_string(),
                    operation: "stop".to_string(),
                    build_version: None,
                    source: None,
                },
                BatchOperationItem {
                    service_id: "s2".to_string(),
                    operation: "stop".to_string(),
                    build_version: None,
                    source: None,
                },
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, "success");
        assert_eq!(results[1].status, "failure");
        assert!(!results[1].err_message.is_empty());
        assert_eq!(results[2].status, "success");
    }

    #[tokio::test]
    async fn test_service_check_windows_routing() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (orchestrator, _store) = orchestrator_with(publisher.clone()).await;

        orchestrator
            .service_check(
                "t1",
                ServiceCheckRequest {
                    source_type: "docker-run".to_string(),
                    source_body: "docker run microsoft/aspnet".to_string(),
                    user: "ops".to_string(),
                },
            )
            .await
            .unwrap();

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, Topic::WindowsBuilder);
        assert_eq!(sent[0].task_type, TaskKind::ServiceCheck);
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant lifecycle and catalog administration.
//!
//! Tenant deletion is asynchronous: the tenant flips to `deleting`, a
//! teardown task goes to the worker fleet, and the worker cascades
//! through everything the tenant owns. The volume-type catalog is a
//! declarative table the console reads to offer storage classes.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use kato_mq::{TaskEnvelope, TaskKind, TaskPublisher, Topic};
use kato_store::repo::{AuthStore, Store, TenantStore};
use kato_store::types::{ProtocolRecord, TenantRecord, VolumeTypeRecord};

use crate::auth::{NODE_MANAGER, SERVER_SOURCE};
use crate::error::{ApiError, Result};
use crate::events::{EventLedger, OpType, OpenEvent, SynType, Target};

/// Tenant creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantRequest {
    /// Tenant alias, unique per region.
    pub tenant_name: String,
    /// Enterprise the tenant belongs to.
    #[serde(default)]
    pub eid: String,
    /// Memory quota in MB; zero means unlimited.
    #[serde(default)]
    pub limit_memory: i32,
}

/// Volume-type catalog request.
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeTypeRequest {
    /// Catalog key.
    pub volume_type: String,
    /// Backing provisioner.
    #[serde(default)]
    pub provisioner: String,
    /// Comma-separated access modes.
    #[serde(default)]
    pub access_mode: String,
    /// Share policy.
    #[serde(default)]
    pub share_policy: String,
    /// Backup policy.
    #[serde(default)]
    pub backup_policy: String,
    /// Reclaim policy.
    #[serde(default)]
    pub reclaim_policy: String,
    /// JSON capacity-validation rules.
    #[serde(default)]
    pub capacity_validation: Option<serde_json::Value>,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Sort weight.
    #[serde(default)]
    pub sort: Option<i32>,
    /// Whether the type is offered.
    #[serde(default = "enabled")]
    pub enable: bool,
}

fn enabled() -> bool {
    true
}

/// Tenant and catalog administration.
#[derive(Clone)]
pub struct TenantAdmin {
    store: Arc<dyn Store>,
    publisher: Arc<dyn TaskPublisher>,
    ledger: EventLedger,
}

impl TenantAdmin {
    /// Create an admin engine.
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn TaskPublisher>,
        ledger: EventLedger,
    ) -> Self {
        Self {
            store,
            publisher,
            ledger,
        }
    }

    /// Create a tenant.
    #[instrument(skip(self, request), fields(tenant_name = %request.tenant_name))]
    pub async fn create_tenant(&self, request: CreateTenantRequest) -> Result<TenantRecord> {
        if request.tenant_name.is_empty() {
            return Err(ApiError::Validation("tenant_name is required".to_string()));
        }
        let tenant = TenantRecord {
            tenant_id: Uuid::new_v4().simple().to_string(),
            tenant_name: request.tenant_name,
            eid: request.eid,
            limit_memory: request.limit_memory,
            status: "active".to_string(),
            created_at: Utc::now(),
        };
        self.store.create_tenant(&tenant).await?;
        info!(tenant_id = %tenant.tenant_id, "Tenant created");
        Ok(tenant)
    }

    /// Fetch a tenant by alias.
    pub async fn get_tenant_by_name(&self, tenant_name: &str) -> Result<TenantRecord> {
        self.store
            .get_tenant_by_name(tenant_name)
            .await?
            .ok_or_else(|| ApiError::NotFound("tenant".to_string()))
    }

    /// All tenants.
    pub async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        Ok(self.store.list_tenants().await?)
    }

    /// Delete a tenant: flip to `deleting`, open the gated event, and
    /// enqueue the teardown. The flip is undone when the enqueue fails
    /// so the tenant is not wedged half-deleted.
    #[instrument(skip(self))]
    pub async fn delete_tenant(&self, tenant_name: &str, user: &str) -> Result<String> {
        let tenant = self.get_tenant_by_name(tenant_name).await?;

        let event = self
            .ledger
            .open_gated(OpenEvent {
                tenant_id: tenant.tenant_id.clone(),
                target: Target::Tenant,
                target_id: tenant.tenant_id.clone(),
                opt_type: OpType::DeleteTenant,
                syn_type: SynType::Async,
                user_name: user.to_string(),
                request_body: String::new(),
            })
            .await?;

        self.store
            .update_tenant_status(&tenant.tenant_id, "deleting")
            .await?;

        let envelope = TaskEnvelope::new(
            Topic::Worker,
            TaskKind::DeleteTenant,
            json!({
                "event_id": event.event_id,
                "tenant_id": tenant.tenant_id,
            }),
            user,
            Utc::now(),
        );
        if let Err(e) = self.publisher.publish(&envelope).await {
            error!(tenant_id = %tenant.tenant_id, error = %e, "Teardown enqueue failed");
            if let Err(restore_err) = self
                .store
                .update_tenant_status(&tenant.tenant_id, "active")
                .await
            {
                error!(tenant_id = %tenant.tenant_id, error = %restore_err, "Failed to restore tenant status");
            }
            if let Err(close_err) = self.ledger.close_event(&event.event_id, 500).await {
                error!(event_id = %event.event_id, error = %close_err, "Failed to close event");
            }
            return Err(e.into());
        }

        info!(tenant_id = %tenant.tenant_id, "Tenant teardown dispatched");
        Ok(event.event_id)
    }

    /// Insert or update a volume-type catalog row.
    pub async fn save_volume_type(&self, request: VolumeTypeRequest) -> Result<VolumeTypeRecord> {
        if request.volume_type.is_empty() {
            return Err(ApiError::Validation("volume_type is required".to_string()));
        }
        let record = VolumeTypeRecord {
            volume_type: request.volume_type,
            provisioner: request.provisioner,
            access_mode: request.access_mode,
            share_policy: request.share_policy,
            backup_policy: request.backup_policy,
            reclaim_policy: request.reclaim_policy,
            capacity_validation: request
                .capacity_validation
                .map(|v| v.to_string())
                .unwrap_or_else(|| "{}".to_string()),
            description: request.description,
            sort: request.sort.unwrap_or(9999),
            enable: request.enable,
        };
        self.store.save_volume_type(&record).await?;
        Ok(record)
    }

    /// The volume-type catalog.
    pub async fn list_volume_types(&self) -> Result<Vec<VolumeTypeRecord>> {
        Ok(self.store.list_volume_types().await?)
    }

    /// Remove a volume-type catalog row.
    pub async fn delete_volume_type(&self, volume_type: &str) -> Result<()> {
        self.store.delete_volume_type(volume_type).await?;
        Ok(())
    }
}

/// Default scope prefixes granted to region consoles.
const SERVER_SOURCE_PREFIXES: [&str; 12] = [
    "/v2/show",
    "/v2/opentsdb",
    "/v2/resources",
    "/v2/builder",
    "/v2/tenants",
    "/v2/app",
    "/v2/port",
    "/v2/volume-types",
    "/v2/gateway",
    "/v2/events",
    "/v2/cluster",
    "/v2/servicecheck",
];

/// Default scope prefixes granted to node managers.
const NODE_MANAGER_PREFIXES: [&str; 3] = ["/v2/nodes", "/v2/job", "/v2/configs"];

/// Default protocol catalog.
const DEFAULT_PROTOCOLS: [(&str, &str); 4] = [
    ("http", "http"),
    ("stream", "mysql"),
    ("stream", "tcp"),
    ("stream", "udp"),
];

/// Seed the api-class map and the protocol catalog. Inserts are
/// idempotent; safe on every startup.
pub async fn bootstrap_defaults(store: &dyn Store) -> Result<()> {
    for prefix in SERVER_SOURCE_PREFIXES {
        store.insert_api_class(SERVER_SOURCE, prefix).await?;
    }
    for prefix in NODE_MANAGER_PREFIXES {
        store.insert_api_class(NODE_MANAGER, prefix).await?;
    }
    for (group, child) in DEFAULT_PROTOCOLS {
        store
            .insert_protocol(&ProtocolRecord {
                protocol_group: group.to_string(),
                protocol_child: child.to_string(),
            })
            .await?;
    }
    info!("Bootstrap defaults seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kato_store::memory::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<TaskEnvelope>>,
        fail: bool,
    }

    #[async_trait]
    impl TaskPublisher for RecordingPublisher {
        async fn publish(&self, envelope: &TaskEnvelope) -> kato_mq::Result<()> {
            if self.fail {
                return Err(kato_mq::MqError::Json(
                    serde_json::from_str::<i32>("queue down").unwrap_err(),
                ));
            }
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    fn admin_with(publisher: Arc<RecordingPublisher>) -> (TenantAdmin, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = EventLedger::new(store.clone());
        (TenantAdmin::new(store.clone(), publisher, ledger), store)
    }

    #[tokio::test]
    async fn test_create_and_delete_tenant() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (admin, store) = admin_with(publisher.clone());

        let tenant = admin
            .create_tenant(CreateTenantRequest {
                tenant_name: "team-a".to_string(),
                eid: "e1".to_string(),
                limit_memory: 4096,
            })
            .await
            .unwrap();
        assert_eq!(tenant.status, "active");

        let event_id = admin.delete_tenant("team-a", "ops").await.unwrap();
        assert!(!event_id.is_empty());

        let stored = store.get_tenant(&tenant.tenant_id).await.unwrap().unwrap();
        assert_eq!(stored.status, "deleting");

        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].task_type, TaskKind::DeleteTenant);
    }

    #[tokio::test]
    async fn test_delete_tenant_restores_status_on_enqueue_failure() {
        let publisher = Arc::new(RecordingPublisher {
            sent: Mutex::new(Vec::new()),
            fail: true,
        });
        let (admin, store) = admin_with(publisher);

        let tenant = admin
            .create_tenant(CreateTenantRequest {
                tenant_name: "team-a".to_string(),
                eid: "e1".to_string(),
                limit_memory: 0,
            })
            .await
            .unwrap();

        let err = admin.delete_tenant("team-a", "ops").await.unwrap_err();
        assert!(matches!(err, ApiError::Downstream(_)));

        let stored = store.get_tenant(&tenant.tenant_id).await.unwrap().unwrap();
        assert_eq!(stored.status, "active");
    }

    #[tokio::test]
    async fn test_duplicate_tenant_name_conflicts() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (admin, _store) = admin_with(publisher);

        admin
            .create_tenant(CreateTenantRequest {
                tenant_name: "team-a".to_string(),
                eid: String::new(),
                limit_memory: 0,
            })
            .await
            .unwrap();
        let err = admin
            .create_tenant(CreateTenantRequest {
                tenant_name: "team-a".to_string(),
                eid: String::new(),
                limit_memory: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let store = MemoryStore::new();
        bootstrap_defaults(&store).await.unwrap();
        bootstrap_defaults(&store).await.unwrap();

        let classes = kato_store::repo::AuthStore::list_api_classes(&store, SERVER_SOURCE)
            .await
            .unwrap();
        assert_eq!(classes.len(), SERVER_SOURCE_PREFIXES.len());

        let protocols = kato_store::repo::TenantStore::list_protocols(&store).await.unwrap();
        assert_eq!(protocols.len(), DEFAULT_PROTOCOLS.len());
    }
}

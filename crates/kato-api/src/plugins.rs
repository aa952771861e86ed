// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plugin attachment engine.
//!
//! Attaches plugins to components with at most one plugin per
//! plugin-model per component. Inbound network plugins intercept
//! traffic before it reaches the component port, so every requested
//! base port gets a distinct plugin-side listen port allocated from the
//! upstream range. Attachment state (relation, upstream ports, env
//! rows, config snapshot) is persisted as one transaction.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use kato_mq::{TaskEnvelope, TaskKind, TaskPublisher, Topic};
use kato_store::repo::{ComponentStore, PluginStore, Store};
use kato_store::types::{
    ComponentRecord, PluginModel, PluginRelationRecord, PluginVersionConfigRecord,
    PluginVersionEnvRecord, UpstreamPortRecord,
};

use crate::error::{ApiError, Result};

/// Lowest plugin-side listen port.
pub const MIN_PLUGIN_PORT: i32 = 65301;

/// Highest plugin-side listen port.
pub const MAX_PLUGIN_PORT: i32 = 65535;

/// Attempts when allocating under the upstream-port unique index.
const ALLOCATE_RETRIES: u32 = 3;

/// Smallest `count` free ports in the plugin range, given the ports
/// already mapped for the (tenant, component). None when the range
/// cannot fit them.
pub fn allocate_upstream_ports(existing: &[i32], count: usize) -> Option<Vec<i32>> {
    let mut allocated = Vec::with_capacity(count);
    let mut candidate = MIN_PLUGIN_PORT;
    while allocated.len() < count && candidate <= MAX_PLUGIN_PORT {
        if !existing.contains(&candidate) {
            allocated.push(candidate);
        }
        candidate += 1;
    }
    (allocated.len() == count).then_some(allocated)
}

/// One base port named in an attach request.
#[derive(Debug, Clone, Deserialize)]
pub struct BasePortReq {
    /// Container port to intercept.
    pub port: i32,
}

/// One env row of an attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct NormalEnv {
    /// Env name.
    pub env_name: String,
    /// Env value.
    #[serde(default)]
    pub env_value: String,
}

/// Versioned env payload of an attach request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigEnvs {
    /// Discovery config snapshot, stored as JSON.
    #[serde(default)]
    pub complex_envs: Option<serde_json::Value>,
    /// Plain env rows.
    #[serde(default)]
    pub normal_envs: Vec<NormalEnv>,
}

/// Attach request.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachPluginRequest {
    /// Plugin to attach.
    pub plugin_id: String,
    /// Plugin build version to run.
    pub version_id: String,
    /// Whether the plugin starts enabled.
    #[serde(default = "default_switch")]
    pub switch: bool,
    /// CPU override in millicores; defaults to the build version's.
    #[serde(default)]
    pub container_cpu: Option<i32>,
    /// Memory override in MB; defaults to the build version's.
    #[serde(default)]
    pub container_memory: Option<i32>,
    /// Base ports to intercept (inbound models only).
    #[serde(default)]
    pub base_ports: Vec<BasePortReq>,
    /// Versioned env payload.
    #[serde(default)]
    pub config_envs: ConfigEnvs,
}

fn default_switch() -> bool {
    true
}

/// One allocated mapping, echoed back to the console.
#[derive(Debug, Clone, Serialize)]
pub struct BasePortMapping {
    /// Container port being intercepted.
    pub container_port: i32,
    /// Allocated plugin-side listen port.
    pub listen_port: i32,
}

/// Attach response.
#[derive(Debug, Clone, Serialize)]
pub struct AttachPluginResult {
    /// Attached plugin.
    pub plugin_id: String,
    /// Plugin model.
    pub plugin_model: String,
    /// Allocated mappings (empty for non-inbound models).
    pub base_ports: Vec<BasePortMapping>,
}

/// The attachment engine.
#[derive(Clone)]
pub struct PluginEngine {
    store: Arc<dyn Store>,
    publisher: Arc<dyn TaskPublisher>,
}

impl PluginEngine {
    /// Create an engine.
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn TaskPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Notify the worker that a component's plugin config changed.
    /// Enqueue failures are logged, not surfaced: the worker's periodic
    /// reconciliation converges eventually.
    async fn publish_plugin_config(&self, service_id: &str, plugin_id: &str, action: &str) {
        let envelope = TaskEnvelope::new(
            Topic::Worker,
            TaskKind::ApplyPluginConfig,
            json!({
                "action": action,
                "service_id": service_id,
                "plugin_id": plugin_id,
            }),
            "",
            Utc::now(),
        );
        if let Err(e) = self.publisher.publish(&envelope).await {
            warn!(service_id, plugin_id, action, error = %e, "Failed to publish plugin config task");
        }
    }

    /// Attach a plugin to a component.
    #[instrument(skip(self, component, request), fields(service_id = %component.service_id, plugin_id = %request.plugin_id))]
    pub async fn attach(
        &self,
        component: &ComponentRecord,
        request: AttachPluginRequest,
    ) -> Result<AttachPluginResult> {
        let plugin = self
            .store
            .get_plugin(&request.plugin_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("plugin".to_string()))?;
        let model = PluginModel::parse(&plugin.plugin_model).ok_or_else(|| {
            ApiError::Validation(format!("unknown plugin model '{}'", plugin.plugin_model))
        })?;

        if self
            .store
            .get_relation_by_model(&component.service_id, &plugin.plugin_model)
            .await?
            .is_some()
        {
            return Err(ApiError::Validation(format!(
                "a plugin with model '{}' is already attached",
                plugin.plugin_model
            )));
        }

        let version = self
            .store
            .get_plugin_build_version(&request.plugin_id, &request.version_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("plugin build version".to_string()))?;

        let relation = PluginRelationRecord {
            service_id: component.service_id.clone(),
            plugin_id: plugin.plugin_id.clone(),
            version_id: request.version_id.clone(),
            plugin_model: plugin.plugin_model.clone(),
            switch: request.switch,
            container_cpu: request.container_cpu.unwrap_or(version.container_cpu),
            container_memory: request.container_memory.unwrap_or(version.container_memory),
        };

        let envs: Vec<PluginVersionEnvRecord> = request
            .config_envs
            .normal_envs
            .iter()
            .map(|env| PluginVersionEnvRecord {
                service_id: component.service_id.clone(),
                plugin_id: plugin.plugin_id.clone(),
                env_name: env.env_name.clone(),
                env_value: env.env_value.clone(),
            })
            .collect();
        let config = match &request.config_envs.complex_envs {
            Some(complex) => Some(PluginVersionConfigRecord {
                service_id: component.service_id.clone(),
                plugin_id: plugin.plugin_id.clone(),
                config_str: serde_json::to_string(complex)?,
                created_at: Utc::now(),
            }),
            None => None,
        };

        // Inbound models need an upstream mapping per requested port;
        // the allocation races on the unique index and retries with a
        // fresh enumeration.
        let mut mappings = Vec::new();
        if model.is_inbound() && !request.base_ports.is_empty() {
            let exposed = self.store.list_ports(&component.service_id).await?;
            for base in &request.base_ports {
                if !exposed.iter().any(|p| p.container_port == base.port) {
                    return Err(ApiError::Validation(format!(
                        "container port {} is not exposed by the component",
                        base.port
                    )));
                }
            }

            let mut attempt = 0;
            loop {
                attempt += 1;
                let existing: Vec<i32> = self
                    .store
                    .list_upstream_ports(&component.tenant_id, &component.service_id)
                    .await?
                    .iter()
                    .map(|p| p.plugin_port)
                    .collect();
                let allocated =
                    allocate_upstream_ports(&existing, request.base_ports.len())
                        .ok_or_else(|| {
                            ApiError::Conflict("no available plugin port".to_string())
                        })?;

                let upstream: Vec<UpstreamPortRecord> = request
                    .base_ports
                    .iter()
                    .zip(allocated.iter())
                    .map(|(base, plugin_port)| UpstreamPortRecord {
                        tenant_id: component.tenant_id.clone(),
                        service_id: component.service_id.clone(),
                        plugin_model: PluginModel::InBoundNetPlugin.as_str().to_string(),
                        container_port: base.port,
                        plugin_port: *plugin_port,
                    })
                    .collect();

                match self
                    .store
                    .attach_plugin(&relation, &upstream, &envs, config.as_ref())
                    .await
                {
                    Ok(()) => {
                        mappings = upstream
                            .iter()
                            .map(|p| BasePortMapping {
                                container_port: p.container_port,
                                listen_port: p.plugin_port,
                            })
                            .collect();
                        break;
                    }
                    Err(e) if e.is_conflict() && attempt < ALLOCATE_RETRIES => {
                        warn!(attempt, "Upstream port allocation raced, retrying");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        } else {
            self.store
                .attach_plugin(&relation, &[], &envs, config.as_ref())
                .await?;
        }

        self.publish_plugin_config(&component.service_id, &plugin.plugin_id, "put")
            .await;

        info!(
            plugin_model = %plugin.plugin_model,
            mappings = mappings.len(),
            "Plugin attached"
        );
        Ok(AttachPluginResult {
            plugin_id: plugin.plugin_id,
            plugin_model: plugin.plugin_model,
            base_ports: mappings,
        })
    }

    /// Detach a plugin: relation, env rows, config snapshot, and (for
    /// inbound models) the component's upstream ports all go.
    #[instrument(skip(self, component), fields(service_id = %component.service_id))]
    pub async fn detach(&self, component: &ComponentRecord, plugin_id: &str) -> Result<()> {
        let relations = self.store.list_relations(&component.service_id).await?;
        let relation = relations
            .iter()
            .find(|r| r.plugin_id == plugin_id)
            .ok_or_else(|| ApiError::NotFound("plugin relation".to_string()))?;
        let model =
            PluginModel::parse(&relation.plugin_model).unwrap_or(PluginModel::GeneralPlugin);

        self.store
            .detach_plugin(&component.service_id, plugin_id, model)
            .await?;

        self.publish_plugin_config(&component.service_id, plugin_id, "delete")
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kato_store::memory::MemoryStore;
    use kato_store::repo::{ComponentStore, PluginStore};
    use kato_store::types::{PluginBuildVersionRecord, PluginRecord, PortRecord};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<TaskEnvelope>>,
    }

    impl RecordingPublisher {
        fn sent(&self) -> Vec<TaskEnvelope> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskPublisher for RecordingPublisher {
        async fn publish(&self, envelope: &TaskEnvelope) -> kato_mq::Result<()> {
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    fn component() -> ComponentRecord {
        ComponentRecord {
            service_id: "s1".to_string(),
            tenant_id: "t1".to_string(),
            app_id: "a1".to_string(),
            service_alias: "grs1".to_string(),
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

    async fn engine_with_inbound_plugin(
    ) -> (PluginEngine, Arc<MemoryStore>, Arc<RecordingPublisher>, ComponentRecord) {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let c = component();
        store.create_component(&c).await.unwrap();
        for port in [5000, 6000] {
            store
                .add_port(&PortRecord {
                    service_id: "s1".to_string(),
                    container_port: port,
                    protocol: "http".to_string(),
                    port_alias: format!("GR{port}"),
                    is_inner_service: false,
                    is_outer_service: true,
                    k8s_service_name: format!("grs1-{port}"),
                })
                .await
                .unwrap();
        }
        store
            .create_plugin(&PluginRecord {
                plugin_id: "p1".to_string(),
                tenant_id: "t1".to_string(),
                plugin_name: "net-governance".to_string(),
                plugin_model: PluginModel::InBoundNetPlugin.as_str().to_string(),
                image: "plugin:latest".to_string(),
                plugin_info: String::new(),
            })
            .await
            .unwrap();
        store
            .create_plugin_build_version(&PluginBuildVersionRecord {
                plugin_id: "p1".to_string(),
                version_id: "pv1".to_string(),
                status: "build_success".to_string(),
                container_cpu: 125,
                container_memory: 64,
            })
            .await
            .unwrap();
        let engine = PluginEngine::new(store.clone(), publisher.clone());
        (engine, store, publisher, c)
    }

    fn attach_request() -> AttachPluginRequest {
        AttachPluginRequest {
            plugin_id: "p1".to_string(),
            version_id: "pv1".to_string(),
            switch: true,
            container_cpu: None,
            container_memory: None,
            base_ports: vec![BasePortReq { port: 5000 }, BasePortReq { port: 6000 }],
            config_envs: ConfigEnvs::default(),
        }
    }

    #[test]
    fn test_allocate_upstream_ports() {
        assert_eq!(
            allocate_upstream_ports(&[], 2),
            Some(vec![MIN_PLUGIN_PORT, MIN_PLUGIN_PORT + 1])
        );
        assert_eq!(
            allocate_upstream_ports(&[MIN_PLUGIN_PORT, MIN_PLUGIN_PORT + 2], 2),
            Some(vec![MIN_PLUGIN_PORT + 1, MIN_PLUGIN_PORT + 3])
        );
        let full: Vec<i32> = (MIN_PLUGIN_PORT..=MAX_PLUGIN_PORT).collect();
        assert_eq!(allocate_upstream_ports(&full, 1), None);
    }

    #[tokio::test]
    async fn test_inbound_attach_allocates_distinct_ports() {
        let (engine, store, _publisher, c) = engine_with_inbound_plugin().await;

        let result = engine.attach(&c, attach_request()).await.unwrap();

        // One mapping per requested base port, with distinct listen ports.
        assert_eq!(result.base_ports.len(), 2);
        assert_ne!(result.base_ports[0].listen_port, result.base_ports[1].listen_port);

        // The persisted rows match the echoed allocations.
        let rows = store.list_upstream_ports("t1", "s1").await.unwrap();
        assert_eq!(rows.len(), 2);
        for mapping in &result.base_ports {
            assert!(rows.iter().any(|r| {
                r.container_port == mapping.container_port && r.plugin_port == mapping.listen_port
            }));
        }
    }

    #[tokio::test]
    async fn test_duplicate_plugin_model_rejected() {
        let (engine, _store, _publisher, c) = engine_with_inbound_plugin().await;
        engine.attach(&c, attach_request()).await.unwrap();

        let err = engine.attach(&c, attach_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_attach_rejects_unexposed_base_port() {
        let (engine, _store, _publisher, c) = engine_with_inbound_plugin().await;
        let mut request = attach_request();
        request.base_ports.push(BasePortReq { port: 7000 });

        let err = engine.attach(&c, request).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_attach_publishes_plugin_config() {
        let (engine, _store, publisher, c) = engine_with_inbound_plugin().await;
        engine.attach(&c, attach_request()).await.unwrap();

        let sent = publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].task_type, TaskKind::ApplyPluginConfig);
        assert_eq!(sent[0].message.task_body["action"], "put");
    }

    #[tokio::test]
    async fn test_detach_removes_upstream_ports() {
        let (engine, store, publisher, c) = engine_with_inbound_plugin().await;
        engine.attach(&c, attach_request()).await.unwrap();

        engine.detach(&c, "p1").await.unwrap();

        assert!(store.list_relations("s1").await.unwrap().is_empty());
        assert!(store.list_upstream_ports("t1", "s1").await.unwrap().is_empty());

        let sent = publisher.sent();
        assert_eq!(sent.last().unwrap().message.task_body["action"], "delete");
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ingress rule engine.
//!
//! HTTP (L7) and TCP (L4) gateway rules. Rules reference a component's
//! exposed container port and turn console configuration into
//! directives the data-plane gateway consumes. After every successful
//! mutation the engine notifies the worker fleet so the data plane is
//! reconciled from the freshly committed state.

pub mod ports;
pub mod rule_config;
pub mod sync;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use kato_mq::{TaskEnvelope, TaskKind, TaskPublisher, Topic};
use kato_store::repo::{ComponentStore, GatewayStore, Store};
use kato_store::types::{
    CertificateRecord, ComponentRecord, HttpRuleRecord, TcpRuleRecord,
};

use crate::error::{ApiError, Result};
use self::ports::{MAX_PORT, MIN_PORT, select_available_port};
use self::rule_config::RuleConfigSpec;
use self::sync::{DesiredComponentRules, compute_sync_plan};

/// Attempts when allocating under the (ip, port) unique index.
const ALLOCATE_RETRIES: u32 = 3;

/// HTTP rule create/update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpRuleRequest {
    /// Rule id; required for update and delete.
    #[serde(default)]
    pub http_rule_id: Option<String>,
    /// Container port the rule targets.
    pub container_port: i32,
    /// Host name to match.
    #[serde(default)]
    pub domain: String,
    /// Path to match; normalized to start with `/`.
    #[serde(default)]
    pub path: Option<String>,
    /// Header match expression.
    #[serde(default)]
    pub header: String,
    /// Cookie match expression.
    #[serde(default)]
    pub cookie: String,
    /// Canary weight.
    #[serde(default)]
    pub weight: Option<i32>,
    /// Gateway IP to bind.
    #[serde(default)]
    pub ip: String,
    /// Certificate reference.
    #[serde(default)]
    pub certificate_id: Option<String>,
    /// PEM certificate body, when the referenced certificate must be
    /// created.
    #[serde(default)]
    pub certificate: Option<String>,
    /// PEM private key, paired with `certificate`.
    #[serde(default)]
    pub private_key: Option<String>,
    /// Display name for a created certificate.
    #[serde(default)]
    pub certificate_name: Option<String>,
    /// Per-rule configuration.
    #[serde(default)]
    pub config: Option<RuleConfigSpec>,
}

/// TCP rule create/update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TcpRuleRequest {
    /// Rule id; required for update and delete.
    #[serde(default)]
    pub tcp_rule_id: Option<String>,
    /// Container port the rule targets.
    pub container_port: i32,
    /// Gateway IP to bind; empty means every address.
    #[serde(default)]
    pub ip: String,
    /// Gateway port; zero or absent means "allocate one".
    #[serde(default)]
    pub port: Option<i32>,
}

/// Port-availability probe response.
#[derive(Debug, Clone, Serialize)]
pub struct AvailablePort {
    /// The IP probed.
    pub ip: String,
    /// The smallest free gateway port.
    pub port: i32,
}

/// The rule engine.
#[derive(Clone)]
pub struct IngressEngine {
    store: Arc<dyn Store>,
    publisher: Arc<dyn TaskPublisher>,
}

impl IngressEngine {
    /// Create an engine.
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn TaskPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Notify the worker fleet that a component's gateway rules changed.
    async fn emit_ingress_task(
        &self,
        action: &str,
        service_id: &str,
        container_port: i32,
    ) -> Result<()> {
        let envelope = TaskEnvelope::new(
            Topic::Worker,
            TaskKind::ApplyRule,
            json!({
                "action": action,
                "service_id": service_id,
                "port": container_port,
                "is_inner": false,
            }),
            "",
            Utc::now(),
        );
        self.publisher.publish(&envelope).await?;
        Ok(())
    }

    /// Resolve the certificate for a rule request: reuse the referenced
    /// row if it exists, otherwise build one from the request payload.
    async fn resolve_certificate(
        &self,
        request: &HttpRuleRequest,
    ) -> Result<Option<CertificateRecord>> {
        let Some(cert_id) = &request.certificate_id else {
            return Ok(None);
        };
        if self.store.get_certificate(cert_id).await?.is_some() {
            return Ok(None);
        }
        let (Some(certificate), Some(private_key)) =
            (&request.certificate, &request.private_key)
        else {
            return Err(ApiError::Validation(format!(
                "certificate '{cert_id}' does not exist and no certificate body was supplied"
            )));
        };
        Ok(Some(CertificateRecord {
            uuid: cert_id.clone(),
            certificate_name: request
                .certificate_name
                .clone()
                .unwrap_or_else(|| cert_id.clone()),
            certificate: certificate.clone(),
            private_key: private_key.clone(),
            created_at: Utc::now(),
        }))
    }

    async fn require_port(&self, component: &ComponentRecord, container_port: i32) -> Result<()> {
        if self
            .store
            .get_port(&component.service_id, container_port)
            .await?
            .is_none()
        {
            return Err(ApiError::Validation(format!(
                "container port {container_port} is not exposed by the component"
            )));
        }
        Ok(())
    }

    // ========================================================================
    // HTTP rules
    // ========================================================================

    /// Create an HTTP rule, its certificate (when supplied) and its
    /// config rows, then notify the data plane.
    #[instrument(skip(self, component, request), fields(service_id = %component.service_id))]
    pub async fn create_http_rule(
        &self,
        component: &ComponentRecord,
        request: HttpRuleRequest,
    ) -> Result<HttpRuleRecord> {
        self.require_port(component, request.container_port).await?;

        let rule_id = request
            .http_rule_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let rule = HttpRuleRecord {
            uuid: rule_id.clone(),
            service_id: component.service_id.clone(),
            container_port: request.container_port,
            domain: request.domain.clone(),
            path: normalize_path(request.path.as_deref()),
            header: request.header.clone(),
            cookie: request.cookie.clone(),
            weight: request.weight.unwrap_or(100),
            ip: request.ip.clone(),
            certificate_id: request.certificate_id.clone(),
        };

        let certificate = self.resolve_certificate(&request).await?;
        let configs = match &request.config {
            Some(spec) => spec.into_rows(&rule_id)?,
            None => Vec::new(),
        };

        self.store
            .add_http_rule(&rule, certificate.as_ref(), &configs)
            .await?;
        self.emit_ingress_task("add", &component.service_id, rule.container_port)
            .await?;

        info!(rule_id, domain = %rule.domain, "HTTP rule created");
        Ok(rule)
    }

    /// Patch an HTTP rule. A supplied certificate id rotates the
    /// reference atomically with the patch.
    #[instrument(skip(self, component, request), fields(service_id = %component.service_id))]
    pub async fn update_http_rule(
        &self,
        component: &ComponentRecord,
        request: HttpRuleRequest,
    ) -> Result<HttpRuleRecord> {
        let rule_id = request
            .http_rule_id
            .clone()
            .ok_or_else(|| ApiError::Validation("http_rule_id is required".to_string()))?;
        let mut rule = self
            .store
            .get_http_rule(&rule_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("http rule".to_string()))?;

        if request.container_port != 0 && request.container_port != rule.container_port {
            self.require_port(component, request.container_port).await?;
            rule.container_port = request.container_port;
        }
        if !request.domain.is_empty() {
            rule.domain = request.domain.clone();
        }
        if let Some(path) = &request.path {
            rule.path = normalize_path(Some(path));
        }
        if !request.header.is_empty() {
            rule.header = request.header.clone();
        }
        if !request.cookie.is_empty() {
            rule.cookie = request.cookie.clone();
        }
        if let Some(weight) = request.weight {
            rule.weight = weight;
        }
        if !request.ip.is_empty() {
            rule.ip = request.ip.clone();
        }
        if request.certificate_id.is_some() {
            rule.certificate_id = request.certificate_id.clone();
        }

        let certificate = self.resolve_certificate(&request).await?;
        let configs = match &request.config {
            Some(spec) => Some(spec.into_rows(&rule_id)?),
            None => None,
        };
        self.store
            .update_http_rule(&rule, certificate.as_ref(), configs.as_deref())
            .await?;
        self.emit_ingress_task("update", &component.service_id, rule.container_port)
            .await?;

        Ok(rule)
    }

    /// Delete an HTTP rule; its config rows cascade.
    #[instrument(skip(self, component), fields(service_id = %component.service_id))]
    pub async fn delete_http_rule(
        &self,
        component: &ComponentRecord,
        rule_id: &str,
    ) -> Result<()> {
        let rule = self
            .store
            .get_http_rule(rule_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("http rule".to_string()))?;
        self.store.delete_http_rule(rule_id).await?;
        self.emit_ingress_task("delete", &component.service_id, rule.container_port)
            .await?;
        Ok(())
    }

    // ========================================================================
    // TCP rules
    // ========================================================================

    /// Create a TCP rule. A zero/absent gateway port means "allocate
    /// the smallest free one"; allocation races on the (ip, port)
    /// unique index and retries with a fresh pick.
    #[instrument(skip(self, component, request), fields(service_id = %component.service_id))]
    pub async fn create_tcp_rule(
        &self,
        component: &ComponentRecord,
        request: TcpRuleRequest,
    ) -> Result<TcpRuleRecord> {
        self.require_port(component, request.container_port).await?;
        let ip = if request.ip.is_empty() {
            "0.0.0.0".to_string()
        } else {
            request.ip.clone()
        };

        match request.port {
            Some(port) if port != 0 => {
                if !(MIN_PORT..=MAX_PORT).contains(&port) {
                    return Err(ApiError::Validation(format!(
                        "port must be between {MIN_PORT} and {MAX_PORT}"
                    )));
                }
                if self.store.tcp_port_exists(&ip, port).await? {
                    return Err(ApiError::Validation(format!(
                        "tcp rule for {ip}:{port} already exists"
                    )));
                }
                let rule = TcpRuleRecord {
                    uuid: request
                        .tcp_rule_id
                        .clone()
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    service_id: component.service_id.clone(),
                    container_port: request.container_port,
                    ip,
                    port,
                };
                self.store.add_tcp_rule(&rule).await.map_err(|e| {
                    if e.is_conflict() {
                        ApiError::Validation(format!(
                            "tcp rule for {}:{} already exists",
                            rule.ip, rule.port
                        ))
                    } else {
                        e.into()
                    }
                })?;
                self.emit_ingress_task("add", &component.service_id, rule.container_port)
                    .await?;
                Ok(rule)
            }
            _ => {
                // Allocate: enumerate, pick, insert; the unique index
                // arbitrates concurrent allocators.
                for _ in 0..ALLOCATE_RETRIES {
                    let existing = self.store.tcp_ports_for_ip(&ip).await?;
                    let port = select_available_port(&existing)
                        .ok_or_else(|| ApiError::Conflict("no available port".to_string()))?;
                    let rule = TcpRuleRecord {
                        uuid: request
                            .tcp_rule_id
                            .clone()
                            .unwrap_or_else(|| Uuid::new_v4().to_string()),
                        service_id: component.service_id.clone(),
                        container_port: request.container_port,
                        ip: ip.clone(),
                        port,
                    };
                    match self.store.add_tcp_rule(&rule).await {
                        Ok(()) => {
                            self.emit_ingress_task(
                                "add",
                                &component.service_id,
                                rule.container_port,
                            )
                            .await?;
                            return Ok(rule);
                        }
                        Err(e) if e.is_conflict() => {
                            warn!(ip = %ip, port, "Allocated port raced, retrying");
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(ApiError::Conflict("no available port".to_string()))
            }
        }
    }

    /// Patch a TCP rule; a changed gateway port is validated against
    /// duplicates first.
    #[instrument(skip(self, component, request), fields(service_id = %component.service_id))]
    pub async fn update_tcp_rule(
        &self,
        component: &ComponentRecord,
        request: TcpRuleRequest,
    ) -> Result<TcpRuleRecord> {
        let rule_id = request
            .tcp_rule_id
            .clone()
            .ok_or_else(|| ApiError::Validation("tcp_rule_id is required".to_string()))?;
        let mut rule = self
            .store
            .get_tcp_rule(&rule_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("tcp rule".to_string()))?;

        if request.container_port != 0 && request.container_port != rule.container_port {
            self.require_port(component, request.container_port).await?;
            rule.container_port = request.container_port;
        }
        if !request.ip.is_empty() {
            rule.ip = request.ip.clone();
        }
        if let Some(port) = request.port {
            if port != 0 && port != rule.port {
                if !(MIN_PORT..=MAX_PORT).contains(&port) {
                    return Err(ApiError::Validation(format!(
                        "port must be between {MIN_PORT} and {MAX_PORT}"
                    )));
                }
                if self.store.tcp_port_exists(&rule.ip, port).await? {
                    return Err(ApiError::Validation(format!(
                        "tcp rule for {}:{port} already exists",
                        rule.ip
                    )));
                }
                rule.port = port;
            }
        }

        self.store.update_tcp_rule(&rule).await?;
        self.emit_ingress_task("update", &component.service_id, rule.container_port)
            .await?;
        Ok(rule)
    }

    /// Delete a TCP rule.
    #[instrument(skip(self, component), fields(service_id = %component.service_id))]
    pub async fn delete_tcp_rule(&self, component: &ComponentRecord, rule_id: &str) -> Result<()> {
        let rule = self
            .store
            .get_tcp_rule(rule_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("tcp rule".to_string()))?;
        self.store.delete_tcp_rule(rule_id).await?;
        self.emit_ingress_task("delete", &component.service_id, rule.container_port)
            .await?;
        Ok(())
    }

    /// The smallest free gateway port on an IP.
    pub async fn get_available_port(&self, ip: &str) -> Result<AvailablePort> {
        let ip = if ip.is_empty() { "0.0.0.0" } else { ip };
        let existing = self.store.tcp_ports_for_ip(ip).await?;
        let port = select_available_port(&existing)
            .ok_or_else(|| ApiError::Conflict("no available port".to_string()))?;
        Ok(AvailablePort {
            ip: ip.to_string(),
            port,
        })
    }

    /// Whether a (ip, port) pair is taken.
    pub async fn tcp_ip_port_exists(&self, ip: &str, port: i32) -> Result<bool> {
        Ok(self.store.tcp_port_exists(ip, port).await?)
    }

    // ========================================================================
    // Sync protocol
    // ========================================================================

    /// Reconcile a snapshot of declared rules. The plan is computed in
    /// memory and applied in one store transaction; when it fails
    /// nothing is emitted to the data plane.
    #[instrument(skip(self, desired), fields(components = desired.len()))]
    pub async fn sync(&self, desired: Vec<DesiredComponentRules>) -> Result<()> {
        let mut current_http = Vec::new();
        let mut current_tcp = Vec::new();
        for d in &desired {
            current_http.extend(self.store.list_http_rules(&d.service_id).await?);
            current_tcp.extend(self.store.list_tcp_rules(&d.service_id).await?);
        }

        let plan = compute_sync_plan(&current_http, &current_tcp, &desired);
        if plan.is_empty() {
            return Ok(());
        }
        self.store.apply_sync(&plan).await?;

        for d in &desired {
            self.emit_ingress_task("update", &d.service_id, 0).await?;
        }
        info!(
            upserts = plan.upsert_http.len() + plan.upsert_tcp.len(),
            deletions = plan.delete_http_rule_ids.len() + plan.delete_tcp_rule_ids.len(),
            "Gateway rules reconciled"
        );
        Ok(())
    }
}

/// Normalize a rule path to start with `/`.
fn normalize_path(path: Option<&str>) -> String {
    match path {
        None => "/".to_string(),
        Some("") => "/".to_string(),
        Some(p) if p.starts_with('/') => p.to_string(),
        Some(p) => format!("/{p}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kato_store::memory::MemoryStore;
    use kato_store::repo::{ComponentStore, GatewayStore};
    use kato_store::types::PortRecord;
    use std::sync::Mutex;

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

    async fn engine_with_component() -> (IngressEngine, Arc<MemoryStore>, ComponentRecord) {
        let store = Arc::new(MemoryStore::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let c = component("s1");
        store.create_component(&c).await.unwrap();
        store
            .add_port(&PortRecord {
                service_id: "s1".to_string(),
                container_port: 5000,
                protocol: "http".to_string(),
                port_alias: "GR5000".to_string(),
                is_inner_service: false,
                is_outer_service: true,
                k8s_service_name: "grs1-5000".to_string(),
            })
            .await
            .unwrap();
        let engine = IngressEngine::new(store.clone(), publisher);
        (engine, store, c)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(None), "/");
        assert_eq!(normalize_path(Some("")), "/");
        assert_eq!(normalize_path(Some("/api")), "/api");
        assert_eq!(normalize_path(Some("api")), "/api");
    }

    #[tokio::test]
    async fn test_create_http_rule_with_configs() {
        let (engine, store, c) = engine_with_component().await;
        let rule = engine
            .create_http_rule(
                &c,
                HttpRuleRequest {
                    container_port: 5000,
                    domain: "app.example.com".to_string(),
                    path: Some("console".to_string()),
                    config: Some(RuleConfigSpec {
                        proxy_read_timeout: Some(120),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(rule.path, "/console");
        let configs = store.list_rule_configs(&rule.uuid).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].key, "proxy-read-timeout");
    }

    #[tokio::test]
    async fn test_create_http_rule_rejects_unexposed_port() {
        let (engine, _store, c) = engine_with_component().await;
        let err = engine
            .create_http_rule(
                &c,
                HttpRuleRequest {
                    container_port: 9999,
                    domain: "app.example.com".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_http_rule_requires_cert_body_for_unknown_cert() {
        let (engine, _store, c) = engine_with_component().await;
        let err = engine
            .create_http_rule(
                &c,
                HttpRuleRequest {
                    container_port: 5000,
                    domain: "app.example.com".to_string(),
                    certificate_id: Some("missing-cert".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_tcp_rule_allocation_scans_gaps() {
        let (engine, store, c) = engine_with_component().await;
        // Seed the S2 shape: 9000 is below the floor, 10002 is the gap.
        for (uuid, port) in [("a", 9000), ("b", 10000), ("c", 10003), ("d", 10001)] {
            store
                .add_tcp_rule(&TcpRuleRecord {
                    uuid: uuid.to_string(),
                    service_id: "other".to_string(),
                    container_port: 3306,
                    ip: "1.2.3.4".to_string(),
                    port,
                })
                .await
                .unwrap();
        }

        let rule = engine
            .create_tcp_rule(
                &c,
                TcpRuleRequest {
                    container_port: 5000,
                    ip: "1.2.3.4".to_string(),
                    port: None,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(rule.port, 10002);
    }

    #[tokio::test]
    async fn test_tcp_rule_explicit_port_validation() {
        let (engine, _store, c) = engine_with_component().await;
        let err = engine
            .create_tcp_rule(
                &c,
                TcpRuleRequest {
                    container_port: 5000,
                    ip: String::new(),
                    port: Some(80),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let rule = engine
            .create_tcp_rule(
                &c,
                TcpRuleRequest {
                    container_port: 5000,
                    ip: String::new(),
                    port: Some(20000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(rule.ip, "0.0.0.0");

        // Same pair again is rejected as a validation error.
        let err = engine
            .create_tcp_rule(
                &c,
                TcpRuleRequest {
                    container_port: 5000,
                    ip: String::new(),
                    port: Some(20000),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sync_reconciles_snapshot() {
        let (engine, store, c) = engine_with_component().await;
        // Existing rule that the snapshot no longer declares.
        let stale = engine
            .create_http_rule(
                &c,
                HttpRuleRequest {
                    container_port: 5000,
                    domain: "stale.example.com".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let declared = HttpRuleRecord {
            uuid: "declared".to_string(),
            service_id: "s1".to_string(),
            container_port: 5000,
            domain: "app.example.com".to_string(),
            path: "/".to_string(),
            header: String::new(),
            cookie: String::new(),
            weight: 100,
            ip: String::new(),
            certificate_id: None,
        };
        engine
            .sync(vec![DesiredComponentRules {
                service_id: "s1".to_string(),
                http_rules: vec![(declared.clone(), vec![])],
                tcp_rules: vec![],
                certificates: vec![],
            }])
            .await
            .unwrap();

        assert!(store.get_http_rule(&stale.uuid).await.unwrap().is_none());
        assert!(store.get_http_rule("declared").await.unwrap().is_some());
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory store backend.
//!
//! Implements the full repository contract over a mutex-guarded state
//! struct. Used by unit tests and offline tooling; behavior matches the
//! Postgres backend for the constraints the gateway relies on
//! (uniqueness conflicts, latest-event ordering, sync-plan dependency
//! order, orphan-certificate guard).

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};
use crate::repo::{
    AuthStore, ComponentStore, EventStore, GatewayStore, PluginStore, TenantStore,
};
use crate::types::{
    ApiClassRecord, ApplicationRecord, BuildVersionRecord, CertificateRecord, ComponentRecord,
    EventRecord, GatewaySyncPlan, HttpRuleRecord, PluginBuildVersionRecord, PluginModel,
    PluginRecord, PluginRelationRecord, PluginVersionConfigRecord, PluginVersionEnvRecord,
    PortRecord, ProtocolRecord, RegionUserInfoRecord, RuleConfigRecord, TcpRuleRecord,
    TenantRecord, UpstreamPortRecord, VolumeTypeRecord,
};

#[derive(Default)]
struct Inner {
    tenants: Vec<TenantRecord>,
    applications: Vec<ApplicationRecord>,
    components: Vec<ComponentRecord>,
    ports: Vec<PortRecord>,
    build_versions: Vec<BuildVersionRecord>,
    events: Vec<EventRecord>,
    http_rules: Vec<HttpRuleRecord>,
    tcp_rules: Vec<TcpRuleRecord>,
    certificates: Vec<CertificateRecord>,
    rule_configs: Vec<RuleConfigRecord>,
    plugins: Vec<PluginRecord>,
    plugin_build_versions: Vec<PluginBuildVersionRecord>,
    plugin_relations: Vec<PluginRelationRecord>,
    upstream_ports: Vec<UpstreamPortRecord>,
    plugin_version_envs: Vec<PluginVersionEnvRecord>,
    plugin_version_configs: Vec<PluginVersionConfigRecord>,
    tokens: Vec<RegionUserInfoRecord>,
    api_classes: Vec<ApiClassRecord>,
    volume_types: Vec<VolumeTypeRecord>,
    protocols: Vec<ProtocolRecord>,
}

/// In-memory store. Cheap to construct per test.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn tcp_ip_matches(rule_ip: &str, ip: &str) -> bool {
    rule_ip == ip || rule_ip == "0.0.0.0" || ip == "0.0.0.0"
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(&self, event: &EventRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(event.clone());
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<EventRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.events.iter().find(|e| e.event_id == event_id).cloned())
    }

    async fn latest_event(&self, target: &str, target_id: &str) -> Result<Option<EventRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .filter(|e| e.target == target && e.target_id == target_id)
            .max_by_key(|e| e.start_time)
            .cloned())
    }

    async fn finalize_event(
        &self,
        event_id: &str,
        status: Option<&str>,
        final_status: &str,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(event) = inner.events.iter_mut().find(|e| e.event_id == event_id) {
            event.end_time = Some(end_time);
            event.final_status = final_status.to_string();
            if let Some(status) = status {
                event.status = status.to_string();
            }
        }
        Ok(())
    }

    async fn list_unfinalized_async(&self, limit: i64) -> Result<Vec<EventRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<EventRecord> = inner
            .events
            .iter()
            .filter(|e| e.syn_type == "async" && e.final_status.is_empty())
            .cloned()
            .collect();
        open.sort_by_key(|e| e.start_time);
        open.truncate(limit as usize);
        Ok(open)
    }
}

#[async_trait]
impl ComponentStore for MemoryStore {
    async fn create_component(&self, component: &ComponentRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.components.iter().any(|c| {
            c.service_id == component.service_id
                || (c.tenant_id == component.tenant_id
                    && c.service_alias == component.service_alias)
        }) {
            return Err(StoreError::Conflict("component already exists".into()));
        }
        inner.components.push(component.clone());
        Ok(())
    }

    async fn get_component(&self, service_id: &str) -> Result<Option<ComponentRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .components
            .iter()
            .find(|c| c.service_id == service_id)
            .cloned())
    }

    async fn get_component_by_alias(
        &self,
        tenant_id: &str,
        service_alias: &str,
    ) -> Result<Option<ComponentRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .components
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.service_alias == service_alias)
            .cloned())
    }

    async fn update_deploy_version(&self, service_id: &str, deploy_version: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(c) = inner
            .components
            .iter_mut()
            .find(|c| c.service_id == service_id)
        {
            c.deploy_version = deploy_version.to_string();
            c.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn add_port(&self, port: &PortRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .ports
            .iter()
            .any(|p| p.service_id == port.service_id && p.container_port == port.container_port)
        {
            return Err(StoreError::Conflict("port already exists".into()));
        }
        inner.ports.push(port.clone());
        Ok(())
    }

    async fn list_ports(&self, service_id: &str) -> Result<Vec<PortRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut ports: Vec<PortRecord> = inner
            .ports
            .iter()
            .filter(|p| p.service_id == service_id)
            .cloned()
            .collect();
        ports.sort_by_key(|p| p.container_port);
        Ok(ports)
    }

    async fn get_port(&self, service_id: &str, container_port: i32) -> Result<Option<PortRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .ports
            .iter()
            .find(|p| p.service_id == service_id && p.container_port == container_port)
            .cloned())
    }

    async fn create_build_version(&self, version: &BuildVersionRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.build_versions.iter().any(|v| {
            v.service_id == version.service_id && v.build_version == version.build_version
        }) {
            return Err(StoreError::Conflict("build version already exists".into()));
        }
        inner.build_versions.push(version.clone());
        Ok(())
    }

    async fn get_build_version(
        &self,
        service_id: &str,
        build_version: &str,
    ) -> Result<Option<BuildVersionRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .build_versions
            .iter()
            .find(|v| v.service_id == service_id && v.build_version == build_version)
            .cloned())
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn add_http_rule(
        &self,
        rule: &HttpRuleRecord,
        certificate: Option<&CertificateRecord>,
        configs: &[RuleConfigRecord],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.http_rules.iter().any(|r| r.uuid == rule.uuid) {
            return Err(StoreError::Conflict("http rule already exists".into()));
        }
        if let Some(cert) = certificate {
            if !inner.certificates.iter().any(|c| c.uuid == cert.uuid) {
                inner.certificates.push(cert.clone());
            }
        }
        inner.http_rules.push(rule.clone());
        inner.rule_configs.retain(|c| c.rule_id != rule.uuid);
        inner.rule_configs.extend(configs.iter().cloned());
        Ok(())
    }

    async fn update_http_rule(
        &self,
        rule: &HttpRuleRecord,
        certificate: Option<&CertificateRecord>,
        configs: Option<&[RuleConfigRecord]>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cert) = certificate {
            if !inner.certificates.iter().any(|c| c.uuid == cert.uuid) {
                inner.certificates.push(cert.clone());
            }
        }
        match inner.http_rules.iter().position(|r| r.uuid == rule.uuid) {
            Some(i) => inner.http_rules[i] = rule.clone(),
            None => inner.http_rules.push(rule.clone()),
        }
        if let Some(configs) = configs {
            inner.rule_configs.retain(|c| c.rule_id != rule.uuid);
            inner.rule_configs.extend(configs.iter().cloned());
        }
        Ok(())
    }

    async fn delete_http_rule(&self, uuid: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.rule_configs.retain(|c| c.rule_id != uuid);
        inner.http_rules.retain(|r| r.uuid != uuid);
        Ok(())
    }

    async fn get_http_rule(&self, uuid: &str) -> Result<Option<HttpRuleRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.http_rules.iter().find(|r| r.uuid == uuid).cloned())
    }

    async fn list_http_rules(&self, service_id: &str) -> Result<Vec<HttpRuleRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .http_rules
            .iter()
            .filter(|r| r.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn get_certificate(&self, uuid: &str) -> Result<Option<CertificateRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.certificates.iter().find(|c| c.uuid == uuid).cloned())
    }

    async fn add_tcp_rule(&self, rule: &TcpRuleRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tcp_rules.iter().any(|r| r.uuid == rule.uuid)
            || inner
                .tcp_rules
                .iter()
                .any(|r| r.port == rule.port && tcp_ip_matches(&r.ip, &rule.ip))
        {
            return Err(StoreError::Conflict("tcp rule already exists".into()));
        }
        inner.tcp_rules.push(rule.clone());
        Ok(())
    }

    async fn update_tcp_rule(&self, rule: &TcpRuleRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .tcp_rules
            .iter()
            .any(|r| r.uuid != rule.uuid && r.port == rule.port && tcp_ip_matches(&r.ip, &rule.ip))
        {
            return Err(StoreError::Conflict("tcp rule already exists".into()));
        }
        if let Some(existing) = inner.tcp_rules.iter_mut().find(|r| r.uuid == rule.uuid) {
            *existing = rule.clone();
        }
        Ok(())
    }

    async fn delete_tcp_rule(&self, uuid: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.rule_configs.retain(|c| c.rule_id != uuid);
        inner.tcp_rules.retain(|r| r.uuid != uuid);
        Ok(())
    }

    async fn get_tcp_rule(&self, uuid: &str) -> Result<Option<TcpRuleRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tcp_rules.iter().find(|r| r.uuid == uuid).cloned())
    }

    async fn list_tcp_rules(&self, service_id: &str) -> Result<Vec<TcpRuleRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tcp_rules
            .iter()
            .filter(|r| r.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn tcp_ports_for_ip(&self, ip: &str) -> Result<Vec<i32>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tcp_rules
            .iter()
            .filter(|r| tcp_ip_matches(&r.ip, ip))
            .map(|r| r.port)
            .collect())
    }

    async fn tcp_port_exists(&self, ip: &str, port: i32) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tcp_rules
            .iter()
            .any(|r| r.port == port && tcp_ip_matches(&r.ip, ip)))
    }

    async fn list_rule_configs(&self, rule_id: &str) -> Result<Vec<RuleConfigRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut configs: Vec<RuleConfigRecord> = inner
            .rule_configs
            .iter()
            .filter(|c| c.rule_id == rule_id)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(configs)
    }

    async fn apply_sync(&self, plan: &GatewaySyncPlan) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        for cert in &plan.ensure_certificates {
            if !inner.certificates.iter().any(|c| c.uuid == cert.uuid) {
                inner.certificates.push(cert.clone());
            }
        }
        for (rule, configs) in &plan.upsert_http {
            match inner.http_rules.iter().position(|r| r.uuid == rule.uuid) {
                Some(i) => inner.http_rules[i] = rule.clone(),
                None => inner.http_rules.push(rule.clone()),
            }
            inner.rule_configs.retain(|c| c.rule_id != rule.uuid);
            inner.rule_configs.extend(configs.iter().cloned());
        }
        for rule in &plan.upsert_tcp {
            match inner.tcp_rules.iter().position(|r| r.uuid == rule.uuid) {
                Some(i) => inner.tcp_rules[i] = rule.clone(),
                None => inner.tcp_rules.push(rule.clone()),
            }
        }

        inner
            .rule_configs
            .retain(|c| !plan.delete_config_rule_ids.contains(&c.rule_id));
        inner
            .http_rules
            .retain(|r| !plan.delete_http_rule_ids.contains(&r.uuid));
        inner
            .tcp_rules
            .retain(|r| !plan.delete_tcp_rule_ids.contains(&r.uuid));

        let referenced: Vec<String> = inner
            .http_rules
            .iter()
            .filter_map(|r| r.certificate_id.clone())
            .collect();
        inner
            .certificates
            .retain(|c| !plan.delete_certificate_ids.contains(&c.uuid) || referenced.contains(&c.uuid));
        Ok(())
    }
}

#[async_trait]
impl PluginStore for MemoryStore {
    async fn create_plugin(&self, plugin: &PluginRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.plugins.iter().any(|p| p.plugin_id == plugin.plugin_id) {
            return Err(StoreError::Conflict("plugin already exists".into()));
        }
        inner.plugins.push(plugin.clone());
        Ok(())
    }

    async fn get_plugin(&self, plugin_id: &str) -> Result<Option<PluginRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .plugins
            .iter()
            .find(|p| p.plugin_id == plugin_id)
            .cloned())
    }

    async fn create_plugin_build_version(&self, version: &PluginBuildVersionRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.plugin_build_versions.push(version.clone());
        Ok(())
    }

    async fn get_plugin_build_version(
        &self,
        plugin_id: &str,
        version_id: &str,
    ) -> Result<Option<PluginBuildVersionRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .plugin_build_versions
            .iter()
            .find(|v| v.plugin_id == plugin_id && v.version_id == version_id)
            .cloned())
    }

    async fn get_relation_by_model(
        &self,
        service_id: &str,
        plugin_model: &str,
    ) -> Result<Option<PluginRelationRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .plugin_relations
            .iter()
            .find(|r| r.service_id == service_id && r.plugin_model == plugin_model)
            .cloned())
    }

    async fn list_relations(&self, service_id: &str) -> Result<Vec<PluginRelationRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .plugin_relations
            .iter()
            .filter(|r| r.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn list_upstream_ports(
        &self,
        tenant_id: &str,
        service_id: &str,
    ) -> Result<Vec<UpstreamPortRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut ports: Vec<UpstreamPortRecord> = inner
            .upstream_ports
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.service_id == service_id)
            .cloned()
            .collect();
        ports.sort_by_key(|p| p.plugin_port);
        Ok(ports)
    }

    async fn attach_plugin(
        &self,
        relation: &PluginRelationRecord,
        upstream_ports: &[UpstreamPortRecord],
        envs: &[PluginVersionEnvRecord],
        config: Option<&PluginVersionConfigRecord>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.plugin_relations.iter().any(|r| {
            r.service_id == relation.service_id && r.plugin_model == relation.plugin_model
        }) {
            return Err(StoreError::Conflict("plugin relation already exists".into()));
        }
        for port in upstream_ports {
            if inner.upstream_ports.iter().any(|p| {
                p.tenant_id == port.tenant_id
                    && p.service_id == port.service_id
                    && p.plugin_port == port.plugin_port
            }) {
                return Err(StoreError::Conflict("upstream port already exists".into()));
            }
        }
        inner.plugin_relations.push(relation.clone());
        inner.upstream_ports.extend(upstream_ports.iter().cloned());
        for env in envs {
            inner.plugin_version_envs.retain(|e| {
                !(e.service_id == env.service_id
                    && e.plugin_id == env.plugin_id
                    && e.env_name == env.env_name)
            });
            inner.plugin_version_envs.push(env.clone());
        }
        if let Some(config) = config {
            inner.plugin_version_configs.retain(|c| {
                !(c.service_id == config.service_id && c.plugin_id == config.plugin_id)
            });
            inner.plugin_version_configs.push(config.clone());
        }
        Ok(())
    }

    async fn detach_plugin(
        &self,
        service_id: &str,
        plugin_id: &str,
        plugin_model: PluginModel,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .plugin_relations
            .retain(|r| !(r.service_id == service_id && r.plugin_id == plugin_id));
        inner
            .plugin_version_envs
            .retain(|e| !(e.service_id == service_id && e.plugin_id == plugin_id));
        inner
            .plugin_version_configs
            .retain(|c| !(c.service_id == service_id && c.plugin_id == plugin_id));
        if plugin_model.is_inbound() {
            inner.upstream_ports.retain(|p| p.service_id != service_id);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn get_token(&self, token: &str) -> Result<Option<RegionUserInfoRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn get_token_by_eid(&self, eid: &str) -> Result<Option<RegionUserInfoRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tokens.iter().find(|t| t.eid == eid).cloned())
    }

    async fn save_token(&self, record: &RegionUserInfoRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.tokens.retain(|t| t.eid != record.eid);
        inner.tokens.push(record.clone());
        Ok(())
    }

    async fn list_valid_tokens(&self, now: i64) -> Result<Vec<RegionUserInfoRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tokens
            .iter()
            .filter(|t| t.validity_period >= now)
            .cloned()
            .collect())
    }

    async fn list_api_classes(&self, class_level: &str) -> Result<Vec<ApiClassRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .api_classes
            .iter()
            .filter(|c| c.class_level == class_level)
            .cloned()
            .collect())
    }

    async fn insert_api_class(&self, class_level: &str, prefix: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner
            .api_classes
            .iter()
            .any(|c| c.class_level == class_level && c.prefix == prefix)
        {
            inner.api_classes.push(ApiClassRecord {
                class_level: class_level.to_string(),
                prefix: prefix.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn create_tenant(&self, tenant: &TenantRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .tenants
            .iter()
            .any(|t| t.tenant_id == tenant.tenant_id || t.tenant_name == tenant.tenant_name)
        {
            return Err(StoreError::Conflict("tenant already exists".into()));
        }
        inner.tenants.push(tenant.clone());
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tenants
            .iter()
            .find(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_tenant_by_name(&self, tenant_name: &str) -> Result<Option<TenantRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tenants
            .iter()
            .find(|t| t.tenant_name == tenant_name)
            .cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tenants.clone())
    }

    async fn update_tenant_status(&self, tenant_id: &str, status: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = inner.tenants.iter_mut().find(|t| t.tenant_id == tenant_id) {
            t.status = status.to_string();
        }
        Ok(())
    }

    async fn create_application(&self, app: &ApplicationRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.applications.iter().any(|a| a.app_id == app.app_id) {
            return Err(StoreError::Conflict("application already exists".into()));
        }
        inner.applications.push(app.clone());
        Ok(())
    }

    async fn get_application(&self, app_id: &str) -> Result<Option<ApplicationRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .applications
            .iter()
            .find(|a| a.app_id == app_id)
            .cloned())
    }

    async fn list_applications(&self, tenant_id: &str) -> Result<Vec<ApplicationRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .applications
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn save_volume_type(&self, volume_type: &VolumeTypeRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .volume_types
            .retain(|v| v.volume_type != volume_type.volume_type);
        inner.volume_types.push(volume_type.clone());
        Ok(())
    }

    async fn list_volume_types(&self) -> Result<Vec<VolumeTypeRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut types = inner.volume_types.clone();
        types.sort_by(|a, b| a.sort.cmp(&b.sort).then(a.volume_type.cmp(&b.volume_type)));
        Ok(types)
    }

    async fn delete_volume_type(&self, volume_type: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.volume_types.retain(|v| v.volume_type != volume_type);
        Ok(())
    }

    async fn insert_protocol(&self, protocol: &ProtocolRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.protocols.iter().any(|p| {
            p.protocol_group == protocol.protocol_group
                && p.protocol_child == protocol.protocol_child
        }) {
            inner.protocols.push(protocol.clone());
        }
        Ok(())
    }

    async fn list_protocols(&self) -> Result<Vec<ProtocolRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.protocols.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::GatewayStore;

    fn tcp_rule(uuid: &str, ip: &str, port: i32) -> TcpRuleRecord {
        TcpRuleRecord {
            uuid: uuid.to_string(),
            service_id: "svc".to_string(),
            container_port: 5000,
            ip: ip.to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_tcp_rule_unique_ip_port() {
        let store = MemoryStore::new();
        store.add_tcp_rule(&tcp_rule("r1", "1.2.3.4", 10000)).await.unwrap();
        let err = store
            .add_tcp_rule(&tcp_rule("r2", "1.2.3.4", 10000))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        // A wildcard bind collides with every address.
        let err = store
            .add_tcp_rule(&tcp_rule("r3", "0.0.0.0", 10000))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_sync_keeps_referenced_certificates() {
        let store = MemoryStore::new();
        let cert = CertificateRecord {
            uuid: "cert-1".to_string(),
            certificate_name: "c".to_string(),
            certificate: "pem".to_string(),
            private_key: "key".to_string(),
            created_at: Utc::now(),
        };
        let rule = HttpRuleRecord {
            uuid: "r1".to_string(),
            service_id: "svc".to_string(),
            container_port: 80,
            domain: "a.example.com".to_string(),
            path: "/".to_string(),
            header: String::new(),
            cookie: String::new(),
            weight: 100,
            ip: String::new(),
            certificate_id: Some("cert-1".to_string()),
        };
        store.add_http_rule(&rule, Some(&cert), &[]).await.unwrap();

        // A plan that tries to prune the cert while the rule still holds it.
        let plan = GatewaySyncPlan {
            delete_certificate_ids: vec!["cert-1".to_string()],
            ..Default::default()
        };
        store.apply_sync(&plan).await.unwrap();
        assert!(store.get_certificate("cert-1").await.unwrap().is_some());

        // Dropping the rule first lets the prune through.
        let plan = GatewaySyncPlan {
            delete_config_rule_ids: vec!["r1".to_string()],
            delete_http_rule_ids: vec!["r1".to_string()],
            delete_certificate_ids: vec!["cert-1".to_string()],
            ..Default::default()
        };
        store.apply_sync(&plan).await.unwrap();
        assert!(store.get_certificate("cert-1").await.unwrap().is_none());
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Repository traits: the persistence contract the gateway codes to.
//!
//! Each trait covers one area of the data model. Methods that mutate more
//! than one table are single calls so the backend owns the transaction
//! boundary; the gateway never stitches a transaction together across
//! calls. All backends must satisfy the uniqueness constraints noted on
//! the individual methods, surfacing violations as
//! [`StoreError::Conflict`](crate::StoreError::Conflict).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    ApiClassRecord, ApplicationRecord, BuildVersionRecord, CertificateRecord, ComponentRecord,
    EventRecord, GatewaySyncPlan, HttpRuleRecord, PluginBuildVersionRecord, PluginModel,
    PluginRecord, PluginRelationRecord, PluginVersionConfigRecord, PluginVersionEnvRecord,
    PortRecord, ProtocolRecord, RegionUserInfoRecord, RuleConfigRecord, TcpRuleRecord,
    TenantRecord, UpstreamPortRecord, VolumeTypeRecord,
};

/// Event ledger persistence.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a freshly opened event.
    async fn create_event(&self, event: &EventRecord) -> Result<()>;

    /// Fetch an event by id.
    async fn get_event(&self, event_id: &str) -> Result<Option<EventRecord>>;

    /// Latest event for a (target, target_id) pair, by start time.
    async fn latest_event(&self, target: &str, target_id: &str) -> Result<Option<EventRecord>>;

    /// Close an event: stamp `end_time`, set `final_status`, and when
    /// `status` is given overwrite the outcome.
    async fn finalize_event(
        &self,
        event_id: &str,
        status: Option<&str>,
        final_status: &str,
        end_time: DateTime<Utc>,
    ) -> Result<()>;

    /// Async events that are still open (empty `final_status`), oldest
    /// first, bounded by `limit`. Used by the timeout sweeper.
    async fn list_unfinalized_async(&self, limit: i64) -> Result<Vec<EventRecord>>;
}

/// Component, port, and build-version persistence.
#[async_trait]
pub trait ComponentStore: Send + Sync {
    /// Insert a component. `(tenant_id, service_alias)` is unique.
    async fn create_component(&self, component: &ComponentRecord) -> Result<()>;

    /// Fetch a component by id.
    async fn get_component(&self, service_id: &str) -> Result<Option<ComponentRecord>>;

    /// Fetch a component by its alias within a tenant.
    async fn get_component_by_alias(
        &self,
        tenant_id: &str,
        service_alias: &str,
    ) -> Result<Option<ComponentRecord>>;

    /// Overwrite the component's deploy version. Used both for the
    /// upgrade transition and its compensating restore.
    async fn update_deploy_version(&self, service_id: &str, deploy_version: &str) -> Result<()>;

    /// Insert an exposed port. `(service_id, container_port)` is unique.
    async fn add_port(&self, port: &PortRecord) -> Result<()>;

    /// All exposed ports of a component.
    async fn list_ports(&self, service_id: &str) -> Result<Vec<PortRecord>>;

    /// One exposed port of a component.
    async fn get_port(&self, service_id: &str, container_port: i32) -> Result<Option<PortRecord>>;

    /// Insert a build version in `building` state.
    async fn create_build_version(&self, version: &BuildVersionRecord) -> Result<()>;

    /// Fetch a build version.
    async fn get_build_version(
        &self,
        service_id: &str,
        build_version: &str,
    ) -> Result<Option<BuildVersionRecord>>;
}

/// Gateway rule persistence: HTTP rules, TCP rules, certificates, and
/// per-rule configuration.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    /// Insert an HTTP rule together with an optional new certificate and
    /// its config rows, in one transaction.
    async fn add_http_rule(
        &self,
        rule: &HttpRuleRecord,
        certificate: Option<&CertificateRecord>,
        configs: &[RuleConfigRecord],
    ) -> Result<()>;

    /// Update an HTTP rule in place; when `certificate` is given it is
    /// created if missing and the rule reference is rotated atomically.
    /// When `configs` is given the rule's config rows are replaced.
    async fn update_http_rule(
        &self,
        rule: &HttpRuleRecord,
        certificate: Option<&CertificateRecord>,
        configs: Option<&[RuleConfigRecord]>,
    ) -> Result<()>;

    /// Delete an HTTP rule and its config rows.
    async fn delete_http_rule(&self, uuid: &str) -> Result<()>;

    /// Fetch an HTTP rule.
    async fn get_http_rule(&self, uuid: &str) -> Result<Option<HttpRuleRecord>>;

    /// All HTTP rules of a component.
    async fn list_http_rules(&self, service_id: &str) -> Result<Vec<HttpRuleRecord>>;

    /// Fetch a certificate.
    async fn get_certificate(&self, uuid: &str) -> Result<Option<CertificateRecord>>;

    /// Insert a TCP rule. `(ip, port)` is unique region-wide; violations
    /// surface as `Conflict` so allocators can retry.
    async fn add_tcp_rule(&self, rule: &TcpRuleRecord) -> Result<()>;

    /// Update a TCP rule in place.
    async fn update_tcp_rule(&self, rule: &TcpRuleRecord) -> Result<()>;

    /// Delete a TCP rule.
    async fn delete_tcp_rule(&self, uuid: &str) -> Result<()>;

    /// Fetch a TCP rule.
    async fn get_tcp_rule(&self, uuid: &str) -> Result<Option<TcpRuleRecord>>;

    /// All TCP rules of a component.
    async fn list_tcp_rules(&self, service_id: &str) -> Result<Vec<TcpRuleRecord>>;

    /// Gateway ports already taken on an IP ("0.0.0.0" counts for every
    /// IP and vice versa).
    async fn tcp_ports_for_ip(&self, ip: &str) -> Result<Vec<i32>>;

    /// Whether a (ip, port) pair is taken.
    async fn tcp_port_exists(&self, ip: &str, port: i32) -> Result<bool>;

    /// Config rows of a rule.
    async fn list_rule_configs(&self, rule_id: &str) -> Result<Vec<RuleConfigRecord>>;

    /// Apply a reconciliation plan in one transaction. Nothing is
    /// applied when any step fails.
    async fn apply_sync(&self, plan: &GatewaySyncPlan) -> Result<()>;
}

/// Plugin catalog and attachment persistence.
#[async_trait]
pub trait PluginStore: Send + Sync {
    /// Insert a plugin catalog row.
    async fn create_plugin(&self, plugin: &PluginRecord) -> Result<()>;

    /// Fetch a plugin.
    async fn get_plugin(&self, plugin_id: &str) -> Result<Option<PluginRecord>>;

    /// Insert a plugin build version.
    async fn create_plugin_build_version(&self, version: &PluginBuildVersionRecord) -> Result<()>;

    /// Fetch a plugin build version.
    async fn get_plugin_build_version(
        &self,
        plugin_id: &str,
        version_id: &str,
    ) -> Result<Option<PluginBuildVersionRecord>>;

    /// Relation of a component for a given plugin model, if any.
    async fn get_relation_by_model(
        &self,
        service_id: &str,
        plugin_model: &str,
    ) -> Result<Option<PluginRelationRecord>>;

    /// All relations of a component.
    async fn list_relations(&self, service_id: &str) -> Result<Vec<PluginRelationRecord>>;

    /// Upstream-port mappings of a component.
    async fn list_upstream_ports(
        &self,
        tenant_id: &str,
        service_id: &str,
    ) -> Result<Vec<UpstreamPortRecord>>;

    /// Persist an attachment: the relation, any allocated upstream
    /// ports, the env rows, and the config snapshot, in one transaction.
    /// Upstream `plugin_port` values are unique per (tenant, component);
    /// violations surface as `Conflict`.
    async fn attach_plugin(
        &self,
        relation: &PluginRelationRecord,
        upstream_ports: &[UpstreamPortRecord],
        envs: &[PluginVersionEnvRecord],
        config: Option<&PluginVersionConfigRecord>,
    ) -> Result<()>;

    /// Remove an attachment: the relation, env rows, config snapshot,
    /// and (for inbound models) every upstream port of the component,
    /// in one transaction.
    async fn detach_plugin(
        &self,
        service_id: &str,
        plugin_id: &str,
        plugin_model: PluginModel,
    ) -> Result<()>;
}

/// Token and scope persistence.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Fetch a token record by token value.
    async fn get_token(&self, token: &str) -> Result<Option<RegionUserInfoRecord>>;

    /// Fetch the token record of an enterprise.
    async fn get_token_by_eid(&self, eid: &str) -> Result<Option<RegionUserInfoRecord>>;

    /// Insert or replace the token record of an enterprise.
    async fn save_token(&self, record: &RegionUserInfoRecord) -> Result<()>;

    /// All records whose validity extends past `now`.
    async fn list_valid_tokens(&self, now: i64) -> Result<Vec<RegionUserInfoRecord>>;

    /// URI prefixes granted to a scope class.
    async fn list_api_classes(&self, class_level: &str) -> Result<Vec<ApiClassRecord>>;

    /// Insert a scope prefix; duplicate (class, prefix) pairs are
    /// ignored so bootstrap is idempotent.
    async fn insert_api_class(&self, class_level: &str, prefix: &str) -> Result<()>;
}

/// Tenant, application, and catalog persistence.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Insert a tenant. `tenant_name` is unique per region.
    async fn create_tenant(&self, tenant: &TenantRecord) -> Result<()>;

    /// Fetch a tenant by id.
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>>;

    /// Fetch a tenant by alias.
    async fn get_tenant_by_name(&self, tenant_name: &str) -> Result<Option<TenantRecord>>;

    /// All tenants.
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>>;

    /// Flip the tenant lifecycle status.
    async fn update_tenant_status(&self, tenant_id: &str, status: &str) -> Result<()>;

    /// Insert an application.
    async fn create_application(&self, app: &ApplicationRecord) -> Result<()>;

    /// Fetch an application.
    async fn get_application(&self, app_id: &str) -> Result<Option<ApplicationRecord>>;

    /// All applications of a tenant.
    async fn list_applications(&self, tenant_id: &str) -> Result<Vec<ApplicationRecord>>;

    /// Insert or update a volume-type catalog row.
    async fn save_volume_type(&self, volume_type: &VolumeTypeRecord) -> Result<()>;

    /// The whole volume-type catalog, sorted for display.
    async fn list_volume_types(&self) -> Result<Vec<VolumeTypeRecord>>;

    /// Remove a volume-type catalog row.
    async fn delete_volume_type(&self, volume_type: &str) -> Result<()>;

    /// Insert a protocol catalog row; duplicates are ignored.
    async fn insert_protocol(&self, protocol: &ProtocolRecord) -> Result<()>;

    /// The protocol catalog.
    async fn list_protocols(&self) -> Result<Vec<ProtocolRecord>>;
}

/// The full persistence contract: every area in one object-safe bound,
/// so the gateway's registry can hold a single `Arc<dyn Store>`.
pub trait Store:
    EventStore + ComponentStore + GatewayStore + PluginStore + AuthStore + TenantStore
{
}

impl<T> Store for T where
    T: EventStore + ComponentStore + GatewayStore + PluginStore + AuthStore + TenantStore
{
}

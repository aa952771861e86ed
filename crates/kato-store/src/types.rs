// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed entity records shared by every store backend.
//!
//! Field names mirror the relational schema one-to-one so the Postgres
//! backend can derive row mapping with `sqlx::FromRow`. Status-like fields
//! stay as strings at this layer; the finite vocabularies the gateway
//! reasons about (plugin models, op types) get their own enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant record. The isolation boundary carrying quota and identity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantRecord {
    /// Opaque tenant id (uuid).
    pub tenant_id: String,
    /// Human alias, unique per region.
    pub tenant_name: String,
    /// Enterprise id the tenant belongs to.
    pub eid: String,
    /// Memory quota in MB. Zero means unlimited.
    pub limit_memory: i32,
    /// Lifecycle status (active, deleting).
    pub status: String,
    /// When the tenant was created.
    pub created_at: DateTime<Utc>,
}

/// Application record: a logical grouping of components inside a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicationRecord {
    /// Opaque application id.
    pub app_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Display name.
    pub app_name: String,
    /// Governance mode for inter-component traffic.
    pub governance_mode: String,
}

/// Component (a.k.a. service) record: one deployable unit.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ComponentRecord {
    /// Opaque component id.
    pub service_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Owning application (empty for legacy unattached components).
    pub app_id: String,
    /// Short alias, unique per tenant; appears in URLs.
    pub service_alias: String,
    /// Component kind (internal, third_party).
    pub kind: String,
    /// Opaque string naming the artifact currently deployed.
    pub deploy_version: String,
    /// Desired replica count.
    pub replicas: i32,
    /// Container memory request in MB.
    pub container_memory: i32,
    /// Container CPU request in millicores.
    pub container_cpu: i32,
    /// Extend method (stateless, stateful, singleton).
    pub extend_method: String,
    /// Operating system type (linux, windows).
    pub os_type: String,
    /// Node-selector label; a `windows` label routes builds to the
    /// windows builder topic.
    pub node_selector: Option<String>,
    /// When the component was created.
    pub created_at: DateTime<Utc>,
    /// When the component was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ComponentRecord {
    /// True when the component is managed by a third party and must not
    /// be operated through the dispatch fabric.
    pub fn is_third_party(&self) -> bool {
        self.kind == "third_party"
    }
}

/// Exposed port of a component. `container_port` is unique per component.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PortRecord {
    /// Owning component.
    pub service_id: String,
    /// Port the container listens on.
    pub container_port: i32,
    /// Protocol (http, mysql, tcp, udp).
    pub protocol: String,
    /// Human alias used in generated env vars.
    pub port_alias: String,
    /// Reachable from inside the tenant network.
    pub is_inner_service: bool,
    /// Reachable through the gateway.
    pub is_outer_service: bool,
    /// Name of the backing kubernetes service.
    pub k8s_service_name: String,
}

/// Build version record: one build attempt for a component.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BuildVersionRecord {
    /// Component the build belongs to.
    pub service_id: String,
    /// Version id, synthesized from wall clock at dispatch.
    pub build_version: String,
    /// Build status (building, success, failure, timeout, lost).
    pub status: String,
    /// How the artifact is delivered (image, slug).
    pub delivered_type: Option<String>,
    /// Where the artifact landed.
    pub delivered_path: Option<String>,
    /// When the build finished.
    pub finish_time: Option<DateTime<Utc>>,
    /// Plan version the build was made under.
    pub plan_version: Option<String>,
    /// Source repository url.
    pub repo_url: Option<String>,
    /// Source branch.
    pub branch: Option<String>,
    /// Commit hash at build time.
    pub commit_hash: Option<String>,
    /// Commit message at build time.
    pub commit_msg: Option<String>,
    /// User who triggered the build.
    pub author: String,
    /// Build command override.
    pub cmd: Option<String>,
    /// When the build was requested.
    pub created_at: DateTime<Utc>,
}

/// Event ledger record: the durable lifecycle of one operation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    /// Event id (uuid).
    pub event_id: String,
    /// Tenant the operation belongs to.
    pub tenant_id: String,
    /// Target kind (tenant, service, port, ...).
    pub target: String,
    /// Target id within the kind.
    pub target_id: String,
    /// Operation type (build, start, stop, upgrade, ...).
    pub opt_type: String,
    /// Whether the operation completes synchronously or via a worker.
    pub syn_type: String,
    /// User who initiated the operation.
    pub user_name: String,
    /// When the operation was opened.
    pub start_time: DateTime<Utc>,
    /// When the operation was closed (complete or timeout).
    pub end_time: Option<DateTime<Utc>>,
    /// Original request body, truncated to 1024 bytes.
    pub request_body: String,
    /// Outcome (empty while open, then success or failure).
    pub status: String,
    /// Finalization marker (empty while open, then complete or timeout).
    pub final_status: String,
}

impl EventRecord {
    /// True when the event no longer blocks the admission gate.
    pub fn is_finalized(&self) -> bool {
        !self.final_status.is_empty()
    }
}

/// L7 gateway rule.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HttpRuleRecord {
    /// Rule id.
    pub uuid: String,
    /// Component the rule routes to.
    pub service_id: String,
    /// Container port the rule targets.
    pub container_port: i32,
    /// Host name to match.
    pub domain: String,
    /// Path to match, normalized to start with `/`.
    pub path: String,
    /// Header match expression.
    pub header: String,
    /// Cookie match expression.
    pub cookie: String,
    /// Canary weight.
    pub weight: i32,
    /// Gateway IP the rule binds to.
    pub ip: String,
    /// Bound certificate, when the rule terminates TLS.
    pub certificate_id: Option<String>,
}

/// L4 gateway rule. `(ip, port)` is unique region-wide.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TcpRuleRecord {
    /// Rule id.
    pub uuid: String,
    /// Component the rule routes to.
    pub service_id: String,
    /// Container port the rule targets.
    pub container_port: i32,
    /// Gateway IP the rule binds to.
    pub ip: String,
    /// Gateway port allocated for the rule.
    pub port: i32,
}

/// TLS certificate referenced by HTTP rules.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CertificateRecord {
    /// Certificate id.
    pub uuid: String,
    /// Display name.
    pub certificate_name: String,
    /// PEM-encoded certificate chain.
    pub certificate: String,
    /// PEM-encoded private key.
    pub private_key: String,
    /// When the certificate was stored.
    pub created_at: DateTime<Utc>,
}

/// One key/value row of per-rule gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RuleConfigRecord {
    /// Owning rule id.
    pub rule_id: String,
    /// Directive key (proxy-read-timeout, set-header-Host, ...).
    #[sqlx(rename = "cfg_key")]
    pub key: String,
    /// Directive value, verbatim.
    #[sqlx(rename = "cfg_value")]
    pub value: String,
}

/// Plugin catalog record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PluginRecord {
    /// Plugin id.
    pub plugin_id: String,
    /// Tenant that owns the plugin.
    pub tenant_id: String,
    /// Display name.
    pub plugin_name: String,
    /// Plugin model (see [`PluginModel`]).
    pub plugin_model: String,
    /// Image the plugin runs from.
    pub image: String,
    /// Free-form description.
    pub plugin_info: String,
}

/// One built version of a plugin with its resource defaults.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PluginBuildVersionRecord {
    /// Plugin the version belongs to.
    pub plugin_id: String,
    /// Version id.
    pub version_id: String,
    /// Build status (building, build_success, build_failure).
    pub status: String,
    /// Default CPU request in millicores.
    pub container_cpu: i32,
    /// Default memory request in MB.
    pub container_memory: i32,
}

/// Attachment of a plugin to a component. At most one relation per
/// (component, plugin-model).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PluginRelationRecord {
    /// Component the plugin is attached to.
    pub service_id: String,
    /// Attached plugin.
    pub plugin_id: String,
    /// Plugin build version in use.
    pub version_id: String,
    /// Plugin model, denormalized for the uniqueness constraint.
    pub plugin_model: String,
    /// Whether the plugin is enabled.
    pub switch: bool,
    /// CPU request for the plugin sidecar in millicores.
    pub container_cpu: i32,
    /// Memory request for the plugin sidecar in MB.
    pub container_memory: i32,
}

/// Plugin-side port allocated for an inbound plugin so traffic can be
/// intercepted before hitting the component port.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UpstreamPortRecord {
    /// Tenant scope of the allocation.
    pub tenant_id: String,
    /// Component scope of the allocation.
    pub service_id: String,
    /// Plugin model the mapping serves.
    pub plugin_model: String,
    /// Component container port being intercepted.
    pub container_port: i32,
    /// Allocated plugin-side listen port.
    pub plugin_port: i32,
}

/// One env row of a plugin attachment (NormalEnvs).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PluginVersionEnvRecord {
    /// Component scope.
    pub service_id: String,
    /// Plugin scope.
    pub plugin_id: String,
    /// Env name.
    pub env_name: String,
    /// Env value.
    pub env_value: String,
}

/// Versioned discovery-config snapshot of a plugin attachment
/// (ComplexEnvs, stored as JSON).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PluginVersionConfigRecord {
    /// Component scope.
    pub service_id: String,
    /// Plugin scope.
    pub plugin_id: String,
    /// JSON snapshot of the discovery config.
    pub config_str: String,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// Bearer-token record for region API access.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegionUserInfoRecord {
    /// Enterprise id the token was issued for.
    pub eid: String,
    /// The bearer token itself.
    pub token: String,
    /// Scope class (all_power, server_source, node_manager).
    pub api_range: String,
    /// PEM CA bundle issued alongside the token, if any.
    pub ca: Option<String>,
    /// PEM private key issued alongside the token, if any.
    pub key: Option<String>,
    /// Expiry as unix seconds. Expired tokens fail closed.
    pub validity_period: i64,
}

/// Scope-class to URI-prefix mapping.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiClassRecord {
    /// Scope class the prefix belongs to.
    pub class_level: String,
    /// URI prefix granted to the class.
    pub prefix: String,
}

/// Volume-type catalog row (declarative storage classes).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VolumeTypeRecord {
    /// Catalog key.
    pub volume_type: String,
    /// Backing provisioner.
    pub provisioner: String,
    /// Comma-separated access modes.
    pub access_mode: String,
    /// Share policy.
    pub share_policy: String,
    /// Backup policy.
    pub backup_policy: String,
    /// Reclaim policy.
    pub reclaim_policy: String,
    /// JSON capacity-validation rules.
    pub capacity_validation: String,
    /// Free-form description.
    pub description: String,
    /// Sort weight for console display.
    pub sort: i32,
    /// Whether the type is offered.
    pub enable: bool,
}

/// Protocol catalog row seeded at bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProtocolRecord {
    /// Protocol group (http, stream).
    pub protocol_group: String,
    /// Concrete protocol (http, mysql, tcp, udp).
    pub protocol_child: String,
}

// ============================================================================
// Finite vocabularies
// ============================================================================

/// Plugin model. Finite and closed; the attachment engine is total over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginModel {
    /// Intercepts inbound traffic before the component port.
    InBoundNetPlugin,
    /// Intercepts outbound traffic from the component.
    OutBoundNetPlugin,
    /// Intercepts both directions.
    InBoundAndOutBoundNetPlugin,
    /// Runs beside the component without touching the network.
    GeneralPlugin,
    /// Runs once before the component starts.
    InitPlugin,
}

impl PluginModel {
    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "net-plugin:in" => Some(Self::InBoundNetPlugin),
            "net-plugin:out" => Some(Self::OutBoundNetPlugin),
            "net-plugin:in-and-out" => Some(Self::InBoundAndOutBoundNetPlugin),
            "general-plugin" => Some(Self::GeneralPlugin),
            "init-plugin" => Some(Self::InitPlugin),
            _ => None,
        }
    }

    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InBoundNetPlugin => "net-plugin:in",
            Self::OutBoundNetPlugin => "net-plugin:out",
            Self::InBoundAndOutBoundNetPlugin => "net-plugin:in-and-out",
            Self::GeneralPlugin => "general-plugin",
            Self::InitPlugin => "init-plugin",
        }
    }

    /// True for models that intercept inbound traffic and therefore need
    /// upstream-port mappings for every exposed container port.
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            Self::InBoundNetPlugin | Self::InBoundAndOutBoundNetPlugin
        )
    }
}

// ============================================================================
// Gateway sync plan
// ============================================================================

/// A reconciliation plan computed in memory by the ingress engine and
/// applied by the store in one transaction.
///
/// Deletions propagate in dependency order: rule-configs first, then
/// rules, then certificates (only certificates no longer referenced by
/// any rule are actually pruned; the store re-checks references inside
/// the transaction).
#[derive(Debug, Clone, Default)]
pub struct GatewaySyncPlan {
    /// Certificates that must exist before rules referencing them.
    pub ensure_certificates: Vec<CertificateRecord>,
    /// HTTP rules to insert or update, each with its full config set
    /// (existing configs for the rule are replaced).
    pub upsert_http: Vec<(HttpRuleRecord, Vec<RuleConfigRecord>)>,
    /// TCP rules to insert or update.
    pub upsert_tcp: Vec<TcpRuleRecord>,
    /// Rule ids whose configs are dropped (rules disappearing from the
    /// desired state).
    pub delete_config_rule_ids: Vec<String>,
    /// HTTP rules to delete.
    pub delete_http_rule_ids: Vec<String>,
    /// TCP rules to delete.
    pub delete_tcp_rule_ids: Vec<String>,
    /// Certificate ids that may have been orphaned.
    pub delete_certificate_ids: Vec<String>,
}

impl GatewaySyncPlan {
    /// True when applying the plan would touch nothing.
    pub fn is_empty(&self) -> bool {
        self.ensure_certificates.is_empty()
            && self.upsert_http.is_empty()
            && self.upsert_tcp.is_empty()
            && self.delete_config_rule_ids.is_empty()
            && self.delete_http_rule_ids.is_empty()
            && self.delete_tcp_rule_ids.is_empty()
            && self.delete_certificate_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_model_round_trip() {
        for model in [
            PluginModel::InBoundNetPlugin,
            PluginModel::OutBoundNetPlugin,
            PluginModel::InBoundAndOutBoundNetPlugin,
            PluginModel::GeneralPlugin,
            PluginModel::InitPlugin,
        ] {
            assert_eq!(PluginModel::parse(model.as_str()), Some(model));
        }
        assert_eq!(PluginModel::parse("no-such-model"), None);
    }

    #[test]
    fn test_plugin_model_inbound() {
        assert!(PluginModel::InBoundNetPlugin.is_inbound());
        assert!(PluginModel::InBoundAndOutBoundNetPlugin.is_inbound());
        assert!(!PluginModel::OutBoundNetPlugin.is_inbound());
        assert!(!PluginModel::GeneralPlugin.is_inbound());
        assert!(!PluginModel::InitPlugin.is_inbound());
    }

    #[test]
    fn test_empty_sync_plan() {
        assert!(GatewaySyncPlan::default().is_empty());
        let plan = GatewaySyncPlan {
            delete_http_rule_ids: vec!["r1".into()],
            ..Default::default()
        };
        assert!(!plan.is_empty());
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Component handlers: creation, operations, status reads.

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use uuid::Uuid;

use kato_mq::kv::service_check_key;
use kato_store::repo::ComponentStore;
use kato_store::types::{ComponentRecord, PortRecord};

use super::{AppState, bean, list, resolve_component, resolve_tenant};
use crate::error::{ApiError, Result};
use crate::events::OpType;
use crate::operations::source::BuildSourceSpec;
use crate::operations::{
    BatchOperationItem, BuildRequest, ServiceCheckRequest, UpgradeRequest,
};

/// Component creation request.
#[derive(Debug, Deserialize)]
pub struct CreateServiceBody {
    /// Component alias, unique per tenant.
    pub service_alias: String,
    /// Owning application.
    #[serde(default)]
    pub app_id: String,
    /// Component kind; defaults to internal.
    #[serde(default)]
    pub kind: Option<String>,
    /// Extend method; defaults to stateless.
    #[serde(default)]
    pub extend_method: Option<String>,
    /// Operating system; defaults to linux.
    #[serde(default)]
    pub os_type: Option<String>,
    /// Desired replicas.
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Memory request in MB.
    #[serde(default)]
    pub container_memory: Option<i32>,
    /// CPU request in millicores.
    #[serde(default)]
    pub container_cpu: Option<i32>,
    /// Node-selector label.
    #[serde(default)]
    pub node_selector: Option<String>,
}

/// `POST /v2/tenants/{tenant_name}/services`
pub async fn create_service(
    State(state): State<AppState>,
    Path(tenant_name): Path<String>,
    Json(body): Json<CreateServiceBody>,
) -> Result<Json<Value>> {
    if body.service_alias.is_empty() {
        return Err(ApiError::Validation("service_alias is required".to_string()));
    }
    let tenant = resolve_tenant(&state, &tenant_name).await?;
    let component = ComponentRecord {
        service_id: Uuid::new_v4().simple().to_string(),
        tenant_id: tenant.tenant_id,
        app_id: body.app_id,
        service_alias: body.service_alias,
        kind: body.kind.unwrap_or_else(|| "internal".to_string()),
        deploy_version: String::new(),
        replicas: body.replicas.unwrap_or(1),
        container_memory: body.container_memory.unwrap_or(512),
        container_cpu: body.container_cpu.unwrap_or(0),
        extend_method: body.extend_method.unwrap_or_else(|| "stateless".to_string()),
        os_type: body.os_type.unwrap_or_else(|| "linux".to_string()),
        node_selector: body.node_selector,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.store.create_component(&component).await?;
    Ok(bean(component))
}

/// Port creation request.
#[derive(Debug, Deserialize)]
pub struct AddPortBody {
    /// Port the container listens on.
    pub container_port: i32,
    /// Protocol; defaults to http.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Alias used in generated env vars.
    #[serde(default)]
    pub port_alias: Option<String>,
    /// Reachable inside the tenant network.
    #[serde(default)]
    pub is_inner_service: bool,
    /// Reachable through the gateway.
    #[serde(default)]
    pub is_outer_service: bool,
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/ports`
pub async fn add_port(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<AddPortBody>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    if !(1..=65535).contains(&body.container_port) {
        return Err(ApiError::Validation(
            "container_port must be between 1 and 65535".to_string(),
        ));
    }
    let port = PortRecord {
        service_id: component.service_id.clone(),
        container_port: body.container_port,
        protocol: body.protocol.unwrap_or_else(|| "http".to_string()),
        port_alias: body
            .port_alias
            .unwrap_or_else(|| format!("{}{}", component.service_alias, body.container_port)),
        is_inner_service: body.is_inner_service,
        is_outer_service: body.is_outer_service,
        k8s_service_name: format!("{}-{}", component.service_alias, body.container_port),
    };
    state.store.add_port(&port).await?;
    Ok(bean(port))
}

/// Build request body.
#[derive(Debug, Deserialize)]
pub struct BuildBody {
    /// Initiating user.
    #[serde(default)]
    pub user: String,
    /// Plan version the build runs under.
    #[serde(default)]
    pub plan_version: Option<String>,
    /// Build source fields.
    #[serde(flatten)]
    pub source: BuildSourceSpec,
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/build`
pub async fn build(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<BuildBody>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let result = state
        .orchestrator
        .build(BuildRequest {
            service_id: component.service_id,
            user: body.user,
            source: body.source,
            plan_version: body.plan_version,
        })
        .await?;
    Ok(bean(result))
}

/// Upgrade / rollback request body.
#[derive(Debug, Deserialize)]
pub struct UpgradeBody {
    /// Target build version.
    pub upgrade_version: String,
    /// Initiating user.
    #[serde(default)]
    pub user: String,
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/upgrade`
pub async fn upgrade(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<UpgradeBody>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let result = state
        .orchestrator
        .upgrade(UpgradeRequest {
            service_id: component.service_id,
            upgrade_version: body.upgrade_version,
            user: body.user,
        })
        .await?;
    Ok(bean(result))
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/rollback`
pub async fn rollback(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<UpgradeBody>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let result = state
        .orchestrator
        .rollback(UpgradeRequest {
            service_id: component.service_id,
            upgrade_version: body.upgrade_version,
            user: body.user,
        })
        .await?;
    Ok(bean(result))
}

/// Optional body of lifecycle posts.
#[derive(Debug, Default, Deserialize)]
pub struct LifecycleBody {
    /// Initiating user.
    #[serde(default)]
    pub user: String,
}

async fn lifecycle(
    state: AppState,
    tenant_name: &str,
    service_alias: &str,
    op: OpType,
    body: Option<Json<LifecycleBody>>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, tenant_name, service_alias).await?;
    let user = body.map(|Json(b)| b.user).unwrap_or_default();
    let result = state
        .orchestrator
        .lifecycle(op, &component.service_id, &user)
        .await?;
    Ok(bean(result))
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/start`
pub async fn start(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    body: Option<Json<LifecycleBody>>,
) -> Result<Json<Value>> {
    lifecycle(state, &tenant_name, &service_alias, OpType::Start, body).await
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/stop`
pub async fn stop(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    body: Option<Json<LifecycleBody>>,
) -> Result<Json<Value>> {
    lifecycle(state, &tenant_name, &service_alias, OpType::Stop, body).await
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/restart`
pub async fn restart(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    body: Option<Json<LifecycleBody>>,
) -> Result<Json<Value>> {
    lifecycle(state, &tenant_name, &service_alias, OpType::Restart, body).await
}

/// Batch request body.
#[derive(Debug, Deserialize)]
pub struct BatchBody {
    /// Operations, executed sequentially in order.
    pub operations: Vec<BatchOperationItem>,
}

/// `POST /v2/tenants/{tenant_name}/batch-operation`
pub async fn batch(
    State(state): State<AppState>,
    Path(tenant_name): Path<String>,
    Json(body): Json<BatchBody>,
) -> Result<Json<Value>> {
    resolve_tenant(&state, &tenant_name).await?;
    let results = state.orchestrator.batch(body.operations).await;
    Ok(list(results))
}

/// `POST /v2/tenants/{tenant_name}/servicecheck`
pub async fn service_check(
    State(state): State<AppState>,
    Path(tenant_name): Path<String>,
    Json(body): Json<ServiceCheckRequest>,
) -> Result<Json<Value>> {
    let tenant = resolve_tenant(&state, &tenant_name).await?;
    let result = state
        .orchestrator
        .service_check(&tenant.tenant_id, body)
        .await?;
    Ok(bean(result))
}

/// `GET /v2/tenants/{tenant_name}/servicecheck/{check_uuid}`
pub async fn get_service_check(
    State(state): State<AppState>,
    Path((tenant_name, check_uuid)): Path<(String, String)>,
) -> Result<Json<Value>> {
    resolve_tenant(&state, &tenant_name).await?;
    let key = service_check_key(&check_uuid);
    let raw = state
        .kv
        .get(&key)
        .await
        .map_err(|e| ApiError::Downstream(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("service check".to_string()))?;
    let value: Value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    Ok(bean(value))
}

/// `GET /v2/tenants/{tenant_name}/services/{service_alias}/pods`
pub async fn pods(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let pods = state.runtime.get_service_pods(&component.service_id).await?;
    Ok(bean(pods))
}

/// `GET /v2/tenants/{tenant_name}/services/{service_alias}/deploy-info`
pub async fn deploy_info(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let info = state.runtime.get_deploy_info(&component.service_id).await?;
    Ok(bean(info))
}

/// `GET /v2/tenants/{tenant_name}/services/{service_alias}/pods/{pod_name}/detail`
pub async fn pod_detail(
    State(state): State<AppState>,
    Path((tenant_name, service_alias, pod_name)): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let detail = state
        .runtime
        .get_pod_detail(&component.service_id, &pod_name)
        .await?;
    Ok(bean(detail))
}

/// `GET /v2/tenants/{tenant_name}/services/{service_alias}/status`
pub async fn status(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let status = state.runtime.get_status(&component.service_id).await;
    Ok(bean(serde_json::json!({
        "service_id": component.service_id,
        "status": status,
    })))
}

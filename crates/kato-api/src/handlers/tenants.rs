// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant and catalog handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use kato_store::repo::TenantStore;

use super::{AppState, bean, list, ok, resolve_tenant};
use crate::admin::{CreateTenantRequest, VolumeTypeRequest};
use crate::error::Result;

/// `POST /v2/tenants`
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(body): Json<CreateTenantRequest>,
) -> Result<Json<Value>> {
    let tenant = state.admin.create_tenant(body).await?;
    Ok(bean(tenant))
}

/// `GET /v2/tenants`
pub async fn list_tenants(State(state): State<AppState>) -> Result<Json<Value>> {
    let tenants = state.admin.list_tenants().await?;
    Ok(list(tenants))
}

/// `GET /v2/tenants/{tenant_name}`: tenant detail with the runtime's
/// live resource accounting overlaid. The runtime being down degrades
/// the overlay to null rather than failing the read.
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(tenant_name): Path<String>,
) -> Result<Json<Value>> {
    let tenant = resolve_tenant(&state, &tenant_name).await?;
    let resources = match state.runtime.get_tenant_resource(&tenant.tenant_id).await {
        Ok(r) => Some(r),
        Err(e) => {
            warn!(tenant_id = %tenant.tenant_id, error = %e, "Failed to read tenant resources");
            None
        }
    };
    Ok(bean(json!({
        "tenant": tenant,
        "resources": resources,
    })))
}

/// Optional delete body.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteTenantBody {
    /// Initiating user.
    #[serde(default)]
    pub user: String,
}

/// `DELETE /v2/tenants/{tenant_name}`
pub async fn delete_tenant(
    State(state): State<AppState>,
    Path(tenant_name): Path<String>,
    body: Option<Json<DeleteTenantBody>>,
) -> Result<Json<Value>> {
    let user = body.map(|Json(b)| b.user).unwrap_or_default();
    let event_id = state.admin.delete_tenant(&tenant_name, &user).await?;
    Ok(bean(json!({ "event_id": event_id })))
}

/// `GET /v2/volume-types`
pub async fn list_volume_types(State(state): State<AppState>) -> Result<Json<Value>> {
    let types = state.admin.list_volume_types().await?;
    Ok(list(types))
}

/// `POST /v2/volume-types`
pub async fn save_volume_type(
    State(state): State<AppState>,
    Json(body): Json<VolumeTypeRequest>,
) -> Result<Json<Value>> {
    let record = state.admin.save_volume_type(body).await?;
    Ok(bean(record))
}

/// `DELETE /v2/volume-types/{volume_type}`
pub async fn delete_volume_type(
    State(state): State<AppState>,
    Path(volume_type): Path<String>,
) -> Result<Json<Value>> {
    state.admin.delete_volume_type(&volume_type).await?;
    Ok(ok())
}

/// `GET /v2/protocols`
pub async fn list_protocols(State(state): State<AppState>) -> Result<Json<Value>> {
    let protocols = state.store.list_protocols().await?;
    Ok(list(protocols))
}

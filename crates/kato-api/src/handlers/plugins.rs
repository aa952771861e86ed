// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plugin attachment handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::Value;

use super::{AppState, bean, ok, resolve_component};
use crate::error::Result;
use crate::plugins::AttachPluginRequest;

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/plugin`
pub async fn attach(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<AttachPluginRequest>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let result = state.plugins.attach(&component, body).await?;
    Ok(bean(result))
}

/// `DELETE /v2/tenants/{tenant_name}/services/{service_alias}/plugin/{plugin_id}`
pub async fn detach(
    State(state): State<AppState>,
    Path((tenant_name, service_alias, plugin_id)): Path<(String, String, String)>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    state.plugins.detach(&component, &plugin_id).await?;
    Ok(ok())
}

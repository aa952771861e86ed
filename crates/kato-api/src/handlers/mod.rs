// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP request handlers.
//!
//! Thin translation from the wire to the engines: resolve path scope,
//! deserialize, call, wrap the answer in the `{code, msg, bean|list}`
//! envelope the console expects. Everything interesting happens in the
//! engines.

pub mod cloud;
pub mod gateway;
pub mod plugins;
pub mod services;
pub mod tenants;

use std::sync::Arc;

use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

use kato_store::repo::{ComponentStore, TenantStore};
use kato_store::types::{ComponentRecord, TenantRecord};

use crate::error::{ApiError, Result};
use crate::registry::Registry;

/// Success envelope with a single object.
pub fn bean<T: Serialize>(value: T) -> Json<Value> {
    Json(json!({ "code": 200, "msg": "success", "bean": value }))
}

/// Success envelope with a list.
pub fn list<T: Serialize>(values: Vec<T>) -> Json<Value> {
    Json(json!({ "code": 200, "msg": "success", "list": values }))
}

/// Success envelope with no payload.
pub fn ok() -> Json<Value> {
    Json(json!({ "code": 200, "msg": "success" }))
}

/// Resolve the tenant named in the path.
pub async fn resolve_tenant(registry: &Registry, tenant_name: &str) -> Result<TenantRecord> {
    registry
        .store
        .get_tenant_by_name(tenant_name)
        .await?
        .ok_or_else(|| ApiError::NotFound("tenant".to_string()))
}

/// Resolve the tenant and component named in the path.
pub async fn resolve_component(
    registry: &Registry,
    tenant_name: &str,
    service_alias: &str,
) -> Result<(TenantRecord, ComponentRecord)> {
    let tenant = resolve_tenant(registry, tenant_name).await?;
    let component = registry
        .store
        .get_component_by_alias(&tenant.tenant_id, service_alias)
        .await?
        .ok_or_else(|| ApiError::NotFound("component".to_string()))?;
    Ok((tenant, component))
}

/// Shared handler state alias.
pub type AppState = Arc<Registry>;

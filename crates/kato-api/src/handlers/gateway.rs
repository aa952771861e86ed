// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway rule handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::Value;

use kato_store::repo::GatewayStore;

use super::{AppState, bean, ok, resolve_component};
use crate::error::{ApiError, Result};
use crate::ingress::{HttpRuleRequest, TcpRuleRequest};

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/http-rule`
pub async fn create_http_rule(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<HttpRuleRequest>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let rule = state.ingress.create_http_rule(&component, body).await?;
    Ok(bean(rule))
}

/// `PUT /v2/tenants/{tenant_name}/services/{service_alias}/http-rule`
pub async fn update_http_rule(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<HttpRuleRequest>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let rule = state.ingress.update_http_rule(&component, body).await?;
    Ok(bean(rule))
}

/// Delete body carrying the rule id.
#[derive(Debug, Deserialize)]
pub struct DeleteHttpRuleBody {
    /// Rule to delete.
    pub http_rule_id: String,
}

/// `DELETE /v2/tenants/{tenant_name}/services/{service_alias}/http-rule`
pub async fn delete_http_rule(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<DeleteHttpRuleBody>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    state
        .ingress
        .delete_http_rule(&component, &body.http_rule_id)
        .await?;
    Ok(ok())
}

/// `POST /v2/tenants/{tenant_name}/services/{service_alias}/tcp-rule`
pub async fn create_tcp_rule(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<TcpRuleRequest>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let rule = state.ingress.create_tcp_rule(&component, body).await?;
    Ok(bean(rule))
}

/// `PUT /v2/tenants/{tenant_name}/services/{service_alias}/tcp-rule`
pub async fn update_tcp_rule(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<TcpRuleRequest>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    let rule = state.ingress.update_tcp_rule(&component, body).await?;
    Ok(bean(rule))
}

/// Delete body carrying the rule id.
#[derive(Debug, Deserialize)]
pub struct DeleteTcpRuleBody {
    /// Rule to delete.
    pub tcp_rule_id: String,
}

/// `DELETE /v2/tenants/{tenant_name}/services/{service_alias}/tcp-rule`
pub async fn delete_tcp_rule(
    State(state): State<AppState>,
    Path((tenant_name, service_alias)): Path<(String, String)>,
    Json(body): Json<DeleteTcpRuleBody>,
) -> Result<Json<Value>> {
    let (_, component) = resolve_component(&state, &tenant_name, &service_alias).await?;
    state
        .ingress
        .delete_tcp_rule(&component, &body.tcp_rule_id)
        .await?;
    Ok(ok())
}

/// Port probe body.
#[derive(Debug, Deserialize)]
pub struct AvailablePortBody {
    /// IP to probe; empty means every address.
    #[serde(default)]
    pub ip: String,
    /// When set, answer whether this exact port is taken instead of
    /// picking a free one.
    #[serde(default)]
    pub port: Option<i32>,
}

/// `POST /v2/gateway/ports`
pub async fn gateway_ports(
    State(state): State<AppState>,
    Json(body): Json<AvailablePortBody>,
) -> Result<Json<Value>> {
    match body.port {
        Some(port) => {
            let exists = state.ingress.tcp_ip_port_exists(&body.ip, port).await?;
            Ok(bean(serde_json::json!({ "ip": body.ip, "port": port, "exists": exists })))
        }
        None => {
            let available = state.ingress.get_available_port(&body.ip).await?;
            Ok(bean(available))
        }
    }
}

/// Certificate inspection response shape.
#[derive(Debug, Deserialize)]
pub struct CertificateQuery {
    /// Certificate to fetch.
    pub certificate_id: String,
}

/// `POST /v2/gateway/certificate`: look up a stored certificate row
/// (without its private key).
pub async fn get_certificate(
    State(state): State<AppState>,
    Json(body): Json<CertificateQuery>,
) -> Result<Json<Value>> {
    let cert = state
        .store
        .get_certificate(&body.certificate_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("certificate".to_string()))?;
    Ok(bean(serde_json::json!({
        "uuid": cert.uuid,
        "certificate_name": cert.certificate_name,
        "certificate": cert.certificate,
        "created_at": cert.created_at,
    })))
}

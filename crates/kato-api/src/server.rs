// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Router construction and the authorization middleware.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::handlers::{AppState, cloud, gateway, plugins, services, tenants};
use crate::registry::Registry;

/// Pull the bearer token out of the Authorization header. Both
/// `Bearer <token>` and a raw token value are accepted.
fn bearer_token(request: &Request) -> Option<String> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .unwrap_or(header);
    (!token.is_empty()).then(|| token.to_string())
}

fn unauthorized(msg: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "code": 401, "msg": msg })),
    )
        .into_response()
}

/// Token middleware. Every route except the liveness probe requires a
/// valid token whose scope covers the request path.
async fn auth_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path == "/healthz" {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(&request) else {
        return unauthorized("missing token");
    };
    match state.token_cache.check_token(&token, &path).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            debug!(path = %path, "Token rejected");
            unauthorized("invalid token")
        }
        Err(e) => e.into_response(),
    }
}

/// Build the gateway router.
pub fn build_router(registry: Arc<Registry>) -> Router {
    let v2 = Router::new()
        .route(
            "/tenants",
            post(tenants::create_tenant).get(tenants::list_tenants),
        )
        .route(
            "/tenants/{tenant_name}",
            get(tenants::get_tenant).delete(tenants::delete_tenant),
        )
        .route(
            "/tenants/{tenant_name}/services",
            post(services::create_service),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/ports",
            post(services::add_port),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/build",
            post(services::build),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/upgrade",
            post(services::upgrade),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/rollback",
            post(services::rollback),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/start",
            post(services::start),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/stop",
            post(services::stop),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/restart",
            post(services::restart),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/pods",
            get(services::pods),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/pods/{pod_name}/detail",
            get(services::pod_detail),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/status",
            get(services::status),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/deploy-info",
            get(services::deploy_info),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/http-rule",
            post(gateway::create_http_rule)
                .put(gateway::update_http_rule)
                .delete(gateway::delete_http_rule),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/tcp-rule",
            post(gateway::create_tcp_rule)
                .put(gateway::update_tcp_rule)
                .delete(gateway::delete_tcp_rule),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/plugin",
            post(plugins::attach),
        )
        .route(
            "/tenants/{tenant_name}/services/{service_alias}/plugin/{plugin_id}",
            delete(plugins::detach),
        )
        .route(
            "/tenants/{tenant_name}/batch-operation",
            post(services::batch),
        )
        .route(
            "/tenants/{tenant_name}/servicecheck",
            post(services::service_check),
        )
        .route(
            "/tenants/{tenant_name}/servicecheck/{check_uuid}",
            get(services::get_service_check),
        )
        .route(
            "/volume-types",
            get(tenants::list_volume_types).post(tenants::save_volume_type),
        )
        .route(
            "/volume-types/{volume_type}",
            delete(tenants::delete_volume_type),
        )
        .route("/protocols", get(tenants::list_protocols))
        .route("/gateway/ports", post(gateway::gateway_ports))
        .route("/gateway/certificate", post(gateway::get_certificate))
        .route("/show", get(cloud::show));

    Router::new()
        .nest("/v2", v2)
        .route("/cloud/auth", post(cloud::auth))
        .route("/cloud/certs", post(cloud::certs))
        .route("/healthz", get(cloud::healthz))
        .layer(middleware::from_fn_with_state(
            registry.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

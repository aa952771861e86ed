// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Admin handlers: token and certificate issuance, region info, health.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use super::{AppState, bean};
use crate::auth::dispatch::{CertDispatchRequest, TokenDispatchRequest};
use crate::error::{ApiError, Result};

/// `POST /cloud/auth`: issue or rotate an enterprise token.
pub async fn auth(
    State(state): State<AppState>,
    Json(body): Json<TokenDispatchRequest>,
) -> Result<Json<Value>> {
    let record = state.token_dispatcher.dispatch(body).await?;
    Ok(bean(record))
}

/// `POST /cloud/certs`: issue a client+server certificate signed by
/// the region CA.
pub async fn certs(
    State(state): State<AppState>,
    Json(body): Json<CertDispatchRequest>,
) -> Result<Json<Value>> {
    let dispatcher = state
        .cert_dispatcher
        .as_ref()
        .ok_or_else(|| ApiError::Validation("region CA is not configured".to_string()))?;
    let issued = dispatcher.issue(&body)?;
    Ok(bean(issued))
}

/// `GET /v2/show`: region identity.
pub async fn show(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(bean(json!({
        "region_name": state.config.region_name,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// `GET /healthz`: liveness, unauthenticated.
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "health", "info": "region api service health" }))
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deadline-enforcing status aggregation client.
//!
//! Wraps the raw [`AppRuntimeSyncClient`] with the gateway's error
//! policy: status reads degrade to `UNKNOW` instead of failing the
//! request, everything else surfaces a typed error, and every call
//! (except pod detail) runs under an explicit deadline.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tracing::warn;

use crate::error::{Result, RuntimeError};
use crate::proto::{
    AddThirdPartyEndpointsReq, AppRuntimeSyncClient, DelThirdPartyEndpointsReq, DeployInfo, Empty,
    GetPodDetailReq, MultiServiceAppPodList, PodDetail, ServiceAppPodList, ServiceRequest,
    ServiceVolumeStatusMessage, ServicesRequest, StorageClasses, TenantRequest, TenantResource,
    TenantResourceList, ThirdPartyEndpoints, UpdThirdPartyEndpointsReq,
};

/// Status reported when the runtime cannot be asked.
pub const UNKNOWN_STATUS: &str = "UNKNOW";

/// Runtime states in which a component is closed for billing: not
/// running and not transitioning toward running.
const TERMINAL_STATUSES: [&str; 6] = [
    "",
    "BUILDEFAILURE",
    "CLOSED",
    "UNDEPLOY",
    "BUILDING",
    UNKNOWN_STATUS,
];

/// True when the status belongs to the terminal (closed) set.
pub fn is_closed_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// Drop every entry whose status is terminal.
fn filter_need_billing(all: HashMap<String, String>) -> HashMap<String, String> {
    all.into_iter()
        .filter(|(_, status)| !is_closed_status(status))
        .collect()
}

const DEADLINE_SINGLE: Duration = Duration::from_secs(5);
const DEADLINE_RESOURCE: Duration = Duration::from_secs(10);
const DEADLINE_MULTI: Duration = Duration::from_secs(15);

/// Connection settings for the runtime synchronizer.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// gRPC endpoints, load-balanced round-robin.
    pub endpoints: Vec<String>,
    /// Optional CA bundle for mutual TLS.
    pub ca_file: Option<PathBuf>,
    /// Optional client certificate.
    pub cert_file: Option<PathBuf>,
    /// Optional client key.
    pub key_file: Option<PathBuf>,
}

/// The aggregation client. Cheap to clone; all methods take `&self`.
#[derive(Clone)]
pub struct StatusClient {
    client: AppRuntimeSyncClient<Channel>,
}

impl StatusClient {
    /// Build a client over the configured endpoints. The channel
    /// connects lazily, so this succeeds even while the runtime is down;
    /// calls fail (or degrade) until it comes back.
    pub async fn connect(config: &RuntimeConfig) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(RuntimeError::NoEndpoints);
        }

        let tls = match (&config.ca_file, &config.cert_file, &config.key_file) {
            (Some(ca), Some(cert), Some(key)) => {
                let ca_pem = tokio::fs::read(ca).await?;
                let cert_pem = tokio::fs::read(cert).await?;
                let key_pem = tokio::fs::read(key).await?;
                Some(
                    ClientTlsConfig::new()
                        .ca_certificate(Certificate::from_pem(ca_pem))
                        .identity(Identity::from_pem(cert_pem, key_pem)),
                )
            }
            _ => None,
        };

        let mut endpoints = Vec::with_capacity(config.endpoints.len());
        for url in &config.endpoints {
            let mut endpoint = Endpoint::from_shared(url.clone())?;
            if let Some(tls) = &tls {
                endpoint = endpoint.tls_config(tls.clone())?;
            }
            endpoints.push(endpoint);
        }
        let channel = Channel::balance_list(endpoints.into_iter());

        Ok(Self {
            client: AppRuntimeSyncClient::new(channel),
        })
    }

    /// Wrap a pre-built channel (tests).
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: AppRuntimeSyncClient::new(channel),
        }
    }

    async fn with_deadline<T, F>(&self, deadline: Duration, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<tonic::Response<T>, tonic::Status>>,
    {
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(status.into()),
            Err(_) => Err(RuntimeError::Deadline(deadline)),
        }
    }

    /// Status of one component. Degrades to `UNKNOW` on any failure.
    pub async fn get_status(&self, service_id: &str) -> String {
        let mut client = self.client.clone();
        let request = ServicesRequest {
            service_ids: service_id.to_string(),
        };
        match self
            .with_deadline(DEADLINE_SINGLE, client.get_app_status(request))
            .await
        {
            Ok(message) => message
                .status
                .get(service_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
            Err(e) => {
                warn!(service_id, error = %e, "Failed to get component status");
                UNKNOWN_STATUS.to_string()
            }
        }
    }

    /// Statuses of many components. On failure every requested id maps
    /// to `UNKNOW`.
    pub async fn get_statuses(&self, service_ids: &[String]) -> HashMap<String, String> {
        let mut client = self.client.clone();
        let request = ServicesRequest {
            service_ids: service_ids.join(","),
        };
        match self
            .with_deadline(DEADLINE_MULTI, client.get_app_status(request))
            .await
        {
            Ok(message) => {
                let mut statuses = message.status;
                for id in service_ids {
                    statuses
                        .entry(id.clone())
                        .or_insert_with(|| UNKNOWN_STATUS.to_string());
                }
                statuses
            }
            Err(e) => {
                warn!(error = %e, "Failed to get component statuses");
                service_ids
                    .iter()
                    .map(|id| (id.clone(), UNKNOWN_STATUS.to_string()))
                    .collect()
            }
        }
    }

    /// Statuses of every component the runtime knows. None on failure.
    pub async fn get_all_status(&self) -> Option<HashMap<String, String>> {
        let mut client = self.client.clone();
        let request = ServicesRequest {
            service_ids: String::new(),
        };
        match self
            .with_deadline(DEADLINE_MULTI, client.get_app_status(request))
            .await
        {
            Ok(message) => Some(message.status),
            Err(e) => {
                warn!(error = %e, "Failed to get all component statuses");
                None
            }
        }
    }

    /// Statuses filtered to components that are billable (not in the
    /// terminal set). None on failure.
    pub async fn get_need_billing_status(&self) -> Option<HashMap<String, String>> {
        self.get_all_status().await.map(filter_need_billing)
    }

    /// Pods of one component.
    pub async fn get_service_pods(&self, service_id: &str) -> Result<ServiceAppPodList> {
        let mut client = self.client.clone();
        let request = ServiceRequest {
            service_id: service_id.to_string(),
        };
        self.with_deadline(DEADLINE_SINGLE, client.get_app_pods(request))
            .await
    }

    /// Pods of many components.
    pub async fn get_multi_service_pods(
        &self,
        service_ids: &[String],
    ) -> Result<MultiServiceAppPodList> {
        let mut client = self.client.clone();
        let request = ServicesRequest {
            service_ids: service_ids.join(","),
        };
        self.with_deadline(DEADLINE_SINGLE, client.get_multi_app_pods(request))
            .await
    }

    /// Deploy info of one component.
    pub async fn get_deploy_info(&self, service_id: &str) -> Result<DeployInfo> {
        let mut client = self.client.clone();
        let request = ServiceRequest {
            service_id: service_id.to_string(),
        };
        self.with_deadline(DEADLINE_SINGLE, client.get_deploy_info(request))
            .await
    }

    /// Resource totals of one tenant.
    pub async fn get_tenant_resource(&self, tenant_id: &str) -> Result<TenantResource> {
        let mut client = self.client.clone();
        let request = TenantRequest {
            tenant_id: tenant_id.to_string(),
        };
        self.with_deadline(DEADLINE_RESOURCE, client.get_tenant_resource(request))
            .await
    }

    /// Resource totals of every tenant.
    pub async fn get_all_tenant_resource(&self) -> Result<TenantResourceList> {
        let mut client = self.client.clone();
        self.with_deadline(DEADLINE_RESOURCE, client.get_tenant_resources(Empty {}))
            .await
    }

    /// Storage classes offered by the runtime.
    pub async fn get_storage_classes(&self) -> Result<StorageClasses> {
        let mut client = self.client.clone();
        self.with_deadline(DEADLINE_RESOURCE, client.get_storage_classes(Empty {}))
            .await
    }

    /// Volume readiness of one component.
    pub async fn get_app_volume_status(
        &self,
        service_id: &str,
    ) -> Result<ServiceVolumeStatusMessage> {
        let mut client = self.client.clone();
        let request = ServiceRequest {
            service_id: service_id.to_string(),
        };
        self.with_deadline(DEADLINE_SINGLE, client.get_app_volume_status(request))
            .await
    }

    /// Full inspection of one pod. Deliberately unbounded: detail pages
    /// may fetch large event lists.
    pub async fn get_pod_detail(&self, service_id: &str, pod_name: &str) -> Result<PodDetail> {
        let mut client = self.client.clone();
        let request = GetPodDetailReq {
            sid: service_id.to_string(),
            pod_name: pod_name.to_string(),
        };
        let response = client.get_pod_detail(request).await?;
        Ok(response.into_inner())
    }

    /// Third-party endpoints of a component.
    pub async fn list_third_party_endpoints(
        &self,
        service_id: &str,
    ) -> Result<ThirdPartyEndpoints> {
        let mut client = self.client.clone();
        let request = ServiceRequest {
            service_id: service_id.to_string(),
        };
        self.with_deadline(DEADLINE_RESOURCE, client.list_third_party_endpoints(request))
            .await
    }

    /// Register a third-party endpoint.
    pub async fn add_third_party_endpoint(&self, req: AddThirdPartyEndpointsReq) -> Result<()> {
        let mut client = self.client.clone();
        self.with_deadline(DEADLINE_RESOURCE, client.add_third_party_endpoint(req))
            .await?;
        Ok(())
    }

    /// Update a third-party endpoint.
    pub async fn upd_third_party_endpoint(&self, req: UpdThirdPartyEndpointsReq) -> Result<()> {
        let mut client = self.client.clone();
        self.with_deadline(DEADLINE_RESOURCE, client.upd_third_party_endpoint(req))
            .await?;
        Ok(())
    }

    /// Remove a third-party endpoint.
    pub async fn del_third_party_endpoint(&self, req: DelThirdPartyEndpointsReq) -> Result<()> {
        let mut client = self.client.clone();
        self.with_deadline(DEADLINE_RESOURCE, client.del_third_party_endpoint(req))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_set() {
        for status in ["", "BUILDEFAILURE", "CLOSED", "UNDEPLOY", "BUILDING", "UNKNOW"] {
            assert!(is_closed_status(status), "{status:?} should be terminal");
        }
        for status in ["RUNNING", "STARTING", "STOPPING", "ABNORMAL", "UPGRADE"] {
            assert!(!is_closed_status(status), "{status:?} should be billable");
        }
    }

    #[test]
    fn test_filter_need_billing() {
        let all: HashMap<String, String> = [
            ("a", "RUNNING"),
            ("b", "CLOSED"),
            ("c", "UNDEPLOY"),
            ("d", "STARTING"),
            ("e", "UNKNOW"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let billable = filter_need_billing(all);
        assert_eq!(billable.len(), 2);
        assert!(billable.contains_key("a"));
        assert!(billable.contains_key("d"));
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Vendored `pb.AppRuntimeSync` protocol types and client.
//!
//! Mirrors the runtime synchronizer's protobuf contract. The message
//! structs and the client below are kept in the exact shape `tonic-build`
//! emits so the wire format stays byte-compatible without requiring
//! `protoc` at build time.

#![allow(missing_docs)]

use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct ServiceRequest {
    #[prost(string, tag = "1")]
    pub service_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct ServicesRequest {
    /// Comma-joined service id list.
    #[prost(string, tag = "1")]
    pub service_ids: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct TenantRequest {
    #[prost(string, tag = "1")]
    pub tenant_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct StatusMessage {
    /// service id -> runtime status string.
    #[prost(map = "string, string", tag = "1")]
    pub status: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct Container {
    #[prost(string, tag = "1")]
    pub container_name: String,
    #[prost(int64, tag = "2")]
    pub memory_limit: i64,
    #[prost(int64, tag = "3")]
    pub cpu_request: i64,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct ServiceAppPod {
    #[prost(string, tag = "1")]
    pub service_id: String,
    #[prost(string, tag = "2")]
    pub deploy_id: String,
    #[prost(string, tag = "3")]
    pub deploy_type: String,
    #[prost(string, tag = "4")]
    pub pod_name: String,
    #[prost(string, tag = "5")]
    pub pod_ip: String,
    #[prost(string, tag = "6")]
    pub pod_status: String,
    #[prost(map = "string, message", tag = "7")]
    pub containers: HashMap<String, Container>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct ServiceAppPodList {
    /// Pods still running the previous deploy version during an upgrade.
    #[prost(message, repeated, tag = "1")]
    pub old_pods: Vec<ServiceAppPod>,
    #[prost(message, repeated, tag = "2")]
    pub new_pods: Vec<ServiceAppPod>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct MultiServiceAppPodList {
    #[prost(map = "string, message", tag = "1")]
    pub service_pods: HashMap<String, ServiceAppPodList>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct DeployInfo {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(string, tag = "2")]
    pub statefuleset: String,
    #[prost(string, tag = "3")]
    pub deployment: String,
    #[prost(string, tag = "4")]
    pub start_time: String,
    #[prost(map = "string, string", tag = "5")]
    pub services: HashMap<String, String>,
    #[prost(map = "string, string", tag = "6")]
    pub endpoints: HashMap<String, String>,
    #[prost(map = "string, string", tag = "7")]
    pub ingresses: HashMap<String, String>,
    #[prost(map = "string, string", tag = "8")]
    pub pods: HashMap<String, String>,
    #[prost(map = "string, string", tag = "9")]
    pub replica_set: HashMap<String, String>,
    #[prost(string, tag = "10")]
    pub status: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct TenantResource {
    #[prost(int64, tag = "1")]
    pub cpu_request: i64,
    #[prost(int64, tag = "2")]
    pub cpu_limit: i64,
    #[prost(int64, tag = "3")]
    pub memory_request: i64,
    #[prost(int64, tag = "4")]
    pub memory_limit: i64,
    #[prost(int64, tag = "5")]
    pub running_app_num: i64,
    #[prost(int64, tag = "6")]
    pub running_app_internal_num: i64,
    #[prost(int64, tag = "7")]
    pub running_app_third_num: i64,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct TenantResourceList {
    #[prost(map = "string, message", tag = "1")]
    pub resources: HashMap<String, TenantResource>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct StorageClassDetail {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub provisioner: String,
    #[prost(string, tag = "3")]
    pub reclaim_policy: String,
    #[prost(string, tag = "4")]
    pub volume_binding_mode: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct StorageClasses {
    #[prost(message, repeated, tag = "1")]
    pub list: Vec<StorageClassDetail>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct ServiceVolumeStatusMessage {
    /// volume name -> status (NOT_READY, READY).
    #[prost(map = "string, string", tag = "1")]
    pub status: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct GetPodDetailReq {
    #[prost(string, tag = "1")]
    pub sid: String,
    #[prost(string, tag = "2")]
    pub pod_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct PodEvent {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(string, tag = "2")]
    pub reason: String,
    #[prost(string, tag = "3")]
    pub age: String,
    #[prost(string, tag = "4")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct PodStatus {
    #[prost(string, tag = "1")]
    pub type_str: String,
    #[prost(string, tag = "2")]
    pub reason: String,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(string, tag = "4")]
    pub advice: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct PodContainer {
    #[prost(string, tag = "1")]
    pub image: String,
    #[prost(string, tag = "2")]
    pub state: String,
    #[prost(string, tag = "3")]
    pub reason: String,
    #[prost(string, tag = "4")]
    pub started: String,
    #[prost(string, tag = "5")]
    pub limit_memory: String,
    #[prost(string, tag = "6")]
    pub limit_cpu: String,
    #[prost(string, tag = "7")]
    pub request_memory: String,
    #[prost(string, tag = "8")]
    pub request_cpu: String,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct PodDetail {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub node: String,
    #[prost(string, tag = "3")]
    pub namespace: String,
    #[prost(string, tag = "4")]
    pub start_time: String,
    #[prost(string, tag = "5")]
    pub ip: String,
    #[prost(message, optional, tag = "6")]
    pub status: Option<PodStatus>,
    #[prost(message, repeated, tag = "7")]
    pub init_containers: Vec<PodContainer>,
    #[prost(message, repeated, tag = "8")]
    pub containers: Vec<PodContainer>,
    #[prost(message, repeated, tag = "9")]
    pub events: Vec<PodEvent>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct ThirdPartyEndpoint {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub sid: String,
    #[prost(string, tag = "3")]
    pub ip: String,
    #[prost(int32, tag = "4")]
    pub port: i32,
    #[prost(string, tag = "5")]
    pub status: String,
    #[prost(bool, tag = "6")]
    pub is_online: bool,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct ThirdPartyEndpoints {
    #[prost(message, repeated, tag = "1")]
    pub obj: Vec<ThirdPartyEndpoint>,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct AddThirdPartyEndpointsReq {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub sid: String,
    #[prost(string, tag = "3")]
    pub ip: String,
    #[prost(int32, tag = "4")]
    pub port: i32,
    #[prost(bool, tag = "5")]
    pub is_online: bool,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct UpdThirdPartyEndpointsReq {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub sid: String,
    #[prost(string, tag = "3")]
    pub ip: String,
    #[prost(int32, tag = "4")]
    pub port: i32,
    #[prost(bool, tag = "5")]
    pub is_online: bool,
}

#[derive(Clone, PartialEq, ::prost::Message, serde::Serialize, serde::Deserialize)]
pub struct DelThirdPartyEndpointsReq {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub sid: String,
    #[prost(string, tag = "3")]
    pub ip: String,
    #[prost(int32, tag = "4")]
    pub port: i32,
}

/// Generated client implementations.
pub mod app_runtime_sync_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::wildcard_imports)]
    use tonic::codegen::*;
    use tonic::codegen::http::Uri;

    #[derive(Debug, Clone)]
    pub struct AppRuntimeSyncClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl AppRuntimeSyncClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> AppRuntimeSyncClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        /// Compress requests with the given encoding.
        #[must_use]
        pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.inner = self.inner.send_compressed(encoding);
            self
        }

        /// Enable decompressing responses.
        #[must_use]
        pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.inner = self.inner.accept_compressed(encoding);
            self
        }

        pub async fn get_app_status(
            &mut self,
            request: impl tonic::IntoRequest<super::ServicesRequest>,
        ) -> std::result::Result<tonic::Response<super::StatusMessage>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetAppStatus");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetAppStatus"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_app_pods(
            &mut self,
            request: impl tonic::IntoRequest<super::ServiceRequest>,
        ) -> std::result::Result<tonic::Response<super::ServiceAppPodList>, tonic::Status>
        {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetAppPods");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetAppPods"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_multi_app_pods(
            &mut self,
            request: impl tonic::IntoRequest<super::ServicesRequest>,
        ) -> std::result::Result<tonic::Response<super::MultiServiceAppPodList>, tonic::Status>
        {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetMultiAppPods");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetMultiAppPods"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_deploy_info(
            &mut self,
            request: impl tonic::IntoRequest<super::ServiceRequest>,
        ) -> std::result::Result<tonic::Response<super::DeployInfo>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetDeployInfo");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetDeployInfo"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_tenant_resource(
            &mut self,
            request: impl tonic::IntoRequest<super::TenantRequest>,
        ) -> std::result::Result<tonic::Response<super::TenantResource>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetTenantResource");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetTenantResource"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_tenant_resources(
            &mut self,
            request: impl tonic::IntoRequest<super::Empty>,
        ) -> std::result::Result<tonic::Response<super::TenantResourceList>, tonic::Status>
        {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetTenantResources");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetTenantResources"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_storage_classes(
            &mut self,
            request: impl tonic::IntoRequest<super::Empty>,
        ) -> std::result::Result<tonic::Response<super::StorageClasses>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetStorageClasses");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetStorageClasses"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_app_volume_status(
            &mut self,
            request: impl tonic::IntoRequest<super::ServiceRequest>,
        ) -> std::result::Result<
            tonic::Response<super::ServiceVolumeStatusMessage>,
            tonic::Status,
        > {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetAppVolumeStatus");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetAppVolumeStatus"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn get_pod_detail(
            &mut self,
            request: impl tonic::IntoRequest<super::GetPodDetailReq>,
        ) -> std::result::Result<tonic::Response<super::PodDetail>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/pb.AppRuntimeSync/GetPodDetail");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "GetPodDetail"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn list_third_party_endpoints(
            &mut self,
            request: impl tonic::IntoRequest<super::ServiceRequest>,
        ) -> std::result::Result<tonic::Response<super::ThirdPartyEndpoints>, tonic::Status>
        {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/pb.AppRuntimeSync/ListThirdPartyEndpoints",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "ListThirdPartyEndpoints"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn add_third_party_endpoint(
            &mut self,
            request: impl tonic::IntoRequest<super::AddThirdPartyEndpointsReq>,
        ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/pb.AppRuntimeSync/AddThirdPartyEndpoint",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "AddThirdPartyEndpoint"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn upd_third_party_endpoint(
            &mut self,
            request: impl tonic::IntoRequest<super::UpdThirdPartyEndpointsReq>,
        ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/pb.AppRuntimeSync/UpdThirdPartyEndpoint",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "UpdThirdPartyEndpoint"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn del_third_party_endpoint(
            &mut self,
            request: impl tonic::IntoRequest<super::DelThirdPartyEndpointsReq>,
        ) -> std::result::Result<tonic::Response<super::Empty>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/pb.AppRuntimeSync/DelThirdPartyEndpoint",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("pb.AppRuntimeSync", "DelThirdPartyEndpoint"));
            self.inner.unary(req, path, codec).await
        }
    }
}

pub use app_runtime_sync_client::AppRuntimeSyncClient;

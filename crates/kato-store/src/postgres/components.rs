// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Component, port, and build-version queries.

use async_trait::async_trait;

use super::PostgresStore;
use crate::error::{Result, map_unique};
use crate::repo::ComponentStore;
use crate::types::{BuildVersionRecord, ComponentRecord, PortRecord};

const COMPONENT_COLUMNS: &str = "service_id, tenant_id, app_id, service_alias, kind, \
     deploy_version, replicas, container_memory, container_cpu, extend_method, os_type, \
     node_selector, created_at, updated_at";

const BUILD_COLUMNS: &str = "service_id, build_version, status, delivered_type, delivered_path, \
     finish_time, plan_version, repo_url, branch, commit_hash, commit_msg, author, cmd, created_at";

#[async_trait]
impl ComponentStore for PostgresStore {
    async fn create_component(&self, component: &ComponentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO components (service_id, tenant_id, app_id, service_alias, kind,
                                    deploy_version, replicas, container_memory, container_cpu,
                                    extend_method, os_type, node_selector, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&component.service_id)
        .bind(&component.tenant_id)
        .bind(&component.app_id)
        .bind(&component.service_alias)
        .bind(&component.kind)
        .bind(&component.deploy_version)
        .bind(component.replicas)
        .bind(component.container_memory)
        .bind(component.container_cpu)
        .bind(&component.extend_method)
        .bind(&component.os_type)
        .bind(&component.node_selector)
        .bind(component.created_at)
        .bind(component.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "component"))?;
        Ok(())
    }

    async fn get_component(&self, service_id: &str) -> Result<Option<ComponentRecord>> {
        let row = sqlx::query_as::<_, ComponentRecord>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE service_id = $1"
        ))
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_component_by_alias(
        &self,
        tenant_id: &str,
        service_alias: &str,
    ) -> Result<Option<ComponentRecord>> {
        let row = sqlx::query_as::<_, ComponentRecord>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components \
             WHERE tenant_id = $1 AND service_alias = $2"
        ))
        .bind(tenant_id)
        .bind(service_alias)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_deploy_version(&self, service_id: &str, deploy_version: &str) -> Result<()> {
        sqlx::query(
            "UPDATE components SET deploy_version = $2, updated_at = NOW() WHERE service_id = $1",
        )
        .bind(service_id)
        .bind(deploy_version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_port(&self, port: &PortRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO component_ports (service_id, container_port, protocol, port_alias,
                                         is_inner_service, is_outer_service, k8s_service_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&port.service_id)
        .bind(port.container_port)
        .bind(&port.protocol)
        .bind(&port.port_alias)
        .bind(port.is_inner_service)
        .bind(port.is_outer_service)
        .bind(&port.k8s_service_name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "port"))?;
        Ok(())
    }

    async fn list_ports(&self, service_id: &str) -> Result<Vec<PortRecord>> {
        let rows = sqlx::query_as::<_, PortRecord>(
            "SELECT service_id, container_port, protocol, port_alias, is_inner_service, \
             is_outer_service, k8s_service_name \
             FROM component_ports WHERE service_id = $1 ORDER BY container_port",
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_port(&self, service_id: &str, container_port: i32) -> Result<Option<PortRecord>> {
        let row = sqlx::query_as::<_, PortRecord>(
            "SELECT service_id, container_port, protocol, port_alias, is_inner_service, \
             is_outer_service, k8s_service_name \
             FROM component_ports WHERE service_id = $1 AND container_port = $2",
        )
        .bind(service_id)
        .bind(container_port)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_build_version(&self, version: &BuildVersionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO build_versions (service_id, build_version, status, delivered_type,
                                        delivered_path, finish_time, plan_version, repo_url,
                                        branch, commit_hash, commit_msg, author, cmd, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&version.service_id)
        .bind(&version.build_version)
        .bind(&version.status)
        .bind(&version.delivered_type)
        .bind(&version.delivered_path)
        .bind(version.finish_time)
        .bind(&version.plan_version)
        .bind(&version.repo_url)
        .bind(&version.branch)
        .bind(&version.commit_hash)
        .bind(&version.commit_msg)
        .bind(&version.author)
        .bind(&version.cmd)
        .bind(version.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "build version"))?;
        Ok(())
    }

    async fn get_build_version(
        &self,
        service_id: &str,
        build_version: &str,
    ) -> Result<Option<BuildVersionRecord>> {
        let row = sqlx::query_as::<_, BuildVersionRecord>(&format!(
            "SELECT {BUILD_COLUMNS} FROM build_versions \
             WHERE service_id = $1 AND build_version = $2"
        ))
        .bind(service_id)
        .bind(build_version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

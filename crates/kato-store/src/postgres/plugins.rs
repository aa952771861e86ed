// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plugin catalog and attachment queries.

use async_trait::async_trait;

use super::PostgresStore;
use crate::error::{Result, map_unique};
use crate::repo::PluginStore;
use crate::types::{
    PluginBuildVersionRecord, PluginModel, PluginRecord, PluginRelationRecord,
    PluginVersionConfigRecord, PluginVersionEnvRecord, UpstreamPortRecord,
};

#[async_trait]
impl PluginStore for PostgresStore {
    async fn create_plugin(&self, plugin: &PluginRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plugins (plugin_id, tenant_id, plugin_name, plugin_model, image, plugin_info)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&plugin.plugin_id)
        .bind(&plugin.tenant_id)
        .bind(&plugin.plugin_name)
        .bind(&plugin.plugin_model)
        .bind(&plugin.image)
        .bind(&plugin.plugin_info)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "plugin"))?;
        Ok(())
    }

    async fn get_plugin(&self, plugin_id: &str) -> Result<Option<PluginRecord>> {
        let row = sqlx::query_as::<_, PluginRecord>(
            "SELECT plugin_id, tenant_id, plugin_name, plugin_model, image, plugin_info \
             FROM plugins WHERE plugin_id = $1",
        )
        .bind(plugin_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_plugin_build_version(&self, version: &PluginBuildVersionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plugin_build_versions (plugin_id, version_id, status, container_cpu,
                                               container_memory)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&version.plugin_id)
        .bind(&version.version_id)
        .bind(&version.status)
        .bind(version.container_cpu)
        .bind(version.container_memory)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "plugin build version"))?;
        Ok(())
    }

    async fn get_plugin_build_version(
        &self,
        plugin_id: &str,
        version_id: &str,
    ) -> Result<Option<PluginBuildVersionRecord>> {
        let row = sqlx::query_as::<_, PluginBuildVersionRecord>(
            "SELECT plugin_id, version_id, status, container_cpu, container_memory \
             FROM plugin_build_versions WHERE plugin_id = $1 AND version_id = $2",
        )
        .bind(plugin_id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_relation_by_model(
        &self,
        service_id: &str,
        plugin_model: &str,
    ) -> Result<Option<PluginRelationRecord>> {
        let row = sqlx::query_as::<_, PluginRelationRecord>(
            "SELECT service_id, plugin_id, version_id, plugin_model, switch, container_cpu, \
             container_memory \
             FROM plugin_relations WHERE service_id = $1 AND plugin_model = $2",
        )
        .bind(service_id)
        .bind(plugin_model)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_relations(&self, service_id: &str) -> Result<Vec<PluginRelationRecord>> {
        let rows = sqlx::query_as::<_, PluginRelationRecord>(
            "SELECT service_id, plugin_id, version_id, plugin_model, switch, container_cpu, \
             container_memory \
             FROM plugin_relations WHERE service_id = $1",
        )
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_upstream_ports(
        &self,
        tenant_id: &str,
        service_id: &str,
    ) -> Result<Vec<UpstreamPortRecord>> {
        let rows = sqlx::query_as::<_, UpstreamPortRecord>(
            "SELECT tenant_id, service_id, plugin_model, container_port, plugin_port \
             FROM plugin_upstream_ports WHERE tenant_id = $1 AND service_id = $2 \
             ORDER BY plugin_port",
        )
        .bind(tenant_id)
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn attach_plugin(
        &self,
        relation: &PluginRelationRecord,
        upstream_ports: &[UpstreamPortRecord],
        envs: &[PluginVersionEnvRecord],
        config: Option<&PluginVersionConfigRecord>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO plugin_relations (service_id, plugin_id, version_id, plugin_model,
                                          switch, container_cpu, container_memory)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&relation.service_id)
        .bind(&relation.plugin_id)
        .bind(&relation.version_id)
        .bind(&relation.plugin_model)
        .bind(relation.switch)
        .bind(relation.container_cpu)
        .bind(relation.container_memory)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "plugin relation"))?;

        for port in upstream_ports {
            sqlx::query(
                r#"
                INSERT INTO plugin_upstream_ports (tenant_id, service_id, plugin_model,
                                                   container_port, plugin_port)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&port.tenant_id)
            .bind(&port.service_id)
            .bind(&port.plugin_model)
            .bind(port.container_port)
            .bind(port.plugin_port)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique(e, "upstream port"))?;
        }

        for env in envs {
            sqlx::query(
                r#"
                INSERT INTO plugin_version_envs (service_id, plugin_id, env_name, env_value)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (service_id, plugin_id, env_name)
                DO UPDATE SET env_value = EXCLUDED.env_value
                "#,
            )
            .bind(&env.service_id)
            .bind(&env.plugin_id)
            .bind(&env.env_name)
            .bind(&env.env_value)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(config) = config {
            sqlx::query(
                r#"
                INSERT INTO plugin_version_configs (service_id, plugin_id, config_str, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (service_id, plugin_id)
                DO UPDATE SET config_str = EXCLUDED.config_str, created_at = EXCLUDED.created_at
                "#,
            )
            .bind(&config.service_id)
            .bind(&config.plugin_id)
            .bind(&config.config_str)
            .bind(config.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn detach_plugin(
        &self,
        service_id: &str,
        plugin_id: &str,
        plugin_model: PluginModel,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM plugin_relations WHERE service_id = $1 AND plugin_id = $2")
            .bind(service_id)
            .bind(plugin_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM plugin_version_envs WHERE service_id = $1 AND plugin_id = $2")
            .bind(service_id)
            .bind(plugin_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM plugin_version_configs WHERE service_id = $1 AND plugin_id = $2")
            .bind(service_id)
            .bind(plugin_id)
            .execute(&mut *tx)
            .await?;
        if plugin_model.is_inbound() {
            sqlx::query("DELETE FROM plugin_upstream_ports WHERE service_id = $1")
                .bind(service_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

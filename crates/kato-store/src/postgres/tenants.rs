// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant, application, and catalog queries.

use async_trait::async_trait;

use super::PostgresStore;
use crate::error::{Result, map_unique};
use crate::repo::TenantStore;
use crate::types::{ApplicationRecord, ProtocolRecord, TenantRecord, VolumeTypeRecord};

const TENANT_COLUMNS: &str = "tenant_id, tenant_name, eid, limit_memory, status, created_at";

const VOLUME_TYPE_COLUMNS: &str = "volume_type, provisioner, access_mode, share_policy, \
     backup_policy, reclaim_policy, capacity_validation, description, sort, enable";

#[async_trait]
impl TenantStore for PostgresStore {
    async fn create_tenant(&self, tenant: &TenantRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (tenant_id, tenant_name, eid, limit_memory, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&tenant.tenant_id)
        .bind(&tenant.tenant_name)
        .bind(&tenant.eid)
        .bind(tenant.limit_memory)
        .bind(&tenant.status)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "tenant"))?;
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>> {
        let row = sqlx::query_as::<_, TenantRecord>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE tenant_id = $1"
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_tenant_by_name(&self, tenant_name: &str) -> Result<Option<TenantRecord>> {
        let row = sqlx::query_as::<_, TenantRecord>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE tenant_name = $1"
        ))
        .bind(tenant_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        let rows = sqlx::query_as::<_, TenantRecord>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_tenant_status(&self, tenant_id: &str, status: &str) -> Result<()> {
        sqlx::query("UPDATE tenants SET status = $2 WHERE tenant_id = $1")
            .bind(tenant_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_application(&self, app: &ApplicationRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO applications (app_id, tenant_id, app_name, governance_mode) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&app.app_id)
        .bind(&app.tenant_id)
        .bind(&app.app_name)
        .bind(&app.governance_mode)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "application"))?;
        Ok(())
    }

    async fn get_application(&self, app_id: &str) -> Result<Option<ApplicationRecord>> {
        let row = sqlx::query_as::<_, ApplicationRecord>(
            "SELECT app_id, tenant_id, app_name, governance_mode FROM applications \
             WHERE app_id = $1",
        )
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_applications(&self, tenant_id: &str) -> Result<Vec<ApplicationRecord>> {
        let rows = sqlx::query_as::<_, ApplicationRecord>(
            "SELECT app_id, tenant_id, app_name, governance_mode FROM applications \
             WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn save_volume_type(&self, volume_type: &VolumeTypeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO volume_types (volume_type, provisioner, access_mode, share_policy,
                                      backup_policy, reclaim_policy, capacity_validation,
                                      description, sort, enable)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (volume_type) DO UPDATE
            SET provisioner = EXCLUDED.provisioner,
                access_mode = EXCLUDED.access_mode,
                share_policy = EXCLUDED.share_policy,
                backup_policy = EXCLUDED.backup_policy,
                reclaim_policy = EXCLUDED.reclaim_policy,
                capacity_validation = EXCLUDED.capacity_validation,
                description = EXCLUDED.description,
                sort = EXCLUDED.sort,
                enable = EXCLUDED.enable
            "#,
        )
        .bind(&volume_type.volume_type)
        .bind(&volume_type.provisioner)
        .bind(&volume_type.access_mode)
        .bind(&volume_type.share_policy)
        .bind(&volume_type.backup_policy)
        .bind(&volume_type.reclaim_policy)
        .bind(&volume_type.capacity_validation)
        .bind(&volume_type.description)
        .bind(volume_type.sort)
        .bind(volume_type.enable)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_volume_types(&self) -> Result<Vec<VolumeTypeRecord>> {
        let rows = sqlx::query_as::<_, VolumeTypeRecord>(&format!(
            "SELECT {VOLUME_TYPE_COLUMNS} FROM volume_types ORDER BY sort, volume_type"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_volume_type(&self, volume_type: &str) -> Result<()> {
        sqlx::query("DELETE FROM volume_types WHERE volume_type = $1")
            .bind(volume_type)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_protocol(&self, protocol: &ProtocolRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO protocols (protocol_group, protocol_child) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(&protocol.protocol_group)
        .bind(&protocol.protocol_child)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_protocols(&self) -> Result<Vec<ProtocolRecord>> {
        let rows = sqlx::query_as::<_, ProtocolRecord>(
            "SELECT protocol_group, protocol_child FROM protocols \
             ORDER BY protocol_group, protocol_child",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

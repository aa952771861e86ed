// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Token and scope queries.

use async_trait::async_trait;

use super::PostgresStore;
use crate::error::Result;
use crate::repo::AuthStore;
use crate::types::{ApiClassRecord, RegionUserInfoRecord};

const TOKEN_COLUMNS: &str = "eid, token, api_range, ca, key, validity_period";

#[async_trait]
impl AuthStore for PostgresStore {
    async fn get_token(&self, token: &str) -> Result<Option<RegionUserInfoRecord>> {
        let row = sqlx::query_as::<_, RegionUserInfoRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM region_user_info WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_token_by_eid(&self, eid: &str) -> Result<Option<RegionUserInfoRecord>> {
        let row = sqlx::query_as::<_, RegionUserInfoRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM region_user_info WHERE eid = $1"
        ))
        .bind(eid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn save_token(&self, record: &RegionUserInfoRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO region_user_info (eid, token, api_range, ca, key, validity_period)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (eid) DO UPDATE
            SET token = EXCLUDED.token,
                api_range = EXCLUDED.api_range,
                ca = EXCLUDED.ca,
                key = EXCLUDED.key,
                validity_period = EXCLUDED.validity_period
            "#,
        )
        .bind(&record.eid)
        .bind(&record.token)
        .bind(&record.api_range)
        .bind(&record.ca)
        .bind(&record.key)
        .bind(record.validity_period)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_valid_tokens(&self, now: i64) -> Result<Vec<RegionUserInfoRecord>> {
        let rows = sqlx::query_as::<_, RegionUserInfoRecord>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM region_user_info WHERE validity_period >= $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_api_classes(&self, class_level: &str) -> Result<Vec<ApiClassRecord>> {
        let rows = sqlx::query_as::<_, ApiClassRecord>(
            "SELECT class_level, prefix FROM region_api_classes WHERE class_level = $1",
        )
        .bind(class_level)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_api_class(&self, class_level: &str, prefix: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO region_api_classes (class_level, prefix) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(class_level)
        .bind(prefix)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event ledger queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PostgresStore;
use crate::error::Result;
use crate::repo::EventStore;
use crate::types::EventRecord;

const EVENT_COLUMNS: &str = "event_id, tenant_id, target, target_id, opt_type, syn_type, \
     user_name, start_time, end_time, request_body, status, final_status";

#[async_trait]
impl EventStore for PostgresStore {
    async fn create_event(&self, event: &EventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (event_id, tenant_id, target, target_id, opt_type, syn_type,
                                user_name, start_time, end_time, request_body, status, final_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.tenant_id)
        .bind(&event.target)
        .bind(&event.target_id)
        .bind(&event.opt_type)
        .bind(&event.syn_type)
        .bind(&event.user_name)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.request_body)
        .bind(&event.status)
        .bind(&event.final_status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<EventRecord>> {
        let row = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE event_id = $1"
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn latest_event(&self, target: &str, target_id: &str) -> Result<Option<EventRecord>> {
        let row = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE target = $1 AND target_id = $2 \
             ORDER BY start_time DESC LIMIT 1"
        ))
        .bind(target)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn finalize_event(
        &self,
        event_id: &str,
        status: Option<&str>,
        final_status: &str,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE events
            SET end_time = $2,
                final_status = $3,
                status = COALESCE($4, status)
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(end_time)
        .bind(final_status)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_unfinalized_async(&self, limit: i64) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE syn_type = 'async' AND final_status = '' \
             ORDER BY start_time ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task publication.
//!
//! One redis list per topic. The gateway only pushes; workers pop with
//! BRPOP so delivery order per topic is FIFO. The gateway never retries
//! a failed publish; the caller reports the failure verbatim so the
//! console can retry the whole operation.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::envelope::{TaskEnvelope, Topic};
use crate::error::Result;

/// Queue key for a topic.
fn topic_key(topic: Topic) -> String {
    format!("kato:tasks:{}", topic.as_str())
}

/// Publisher seam between the orchestrator and the queue, so tests can
/// inject failing or recording implementations.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    /// Serialize and enqueue one envelope. At-least-once; no internal retry.
    async fn publish(&self, envelope: &TaskEnvelope) -> Result<()>;
}

/// Redis-backed task queue.
#[derive(Clone)]
pub struct RedisTaskQueue {
    conn: ConnectionManager,
}

impl RedisTaskQueue {
    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to redis.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// The shared connection, for the ephemeral keyspace.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl TaskPublisher for RedisTaskQueue {
    async fn publish(&self, envelope: &TaskEnvelope) -> Result<()> {
        let payload = serde_json::to_string(envelope)?;
        let key = topic_key(envelope.topic);
        let mut conn = self.conn.clone();
        let () = conn.lpush(&key, &payload).await?;
        debug!(
            topic = envelope.topic.as_str(),
            task_type = envelope.task_type.as_str(),
            "Task enqueued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_keys() {
        assert_eq!(topic_key(Topic::Worker), "kato:tasks:worker");
        assert_eq!(topic_key(Topic::Builder), "kato:tasks:builder");
        assert_eq!(topic_key(Topic::WindowsBuilder), "kato:tasks:windows_builder");
    }
}

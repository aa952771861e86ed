// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The task envelope: what actually travels over the queue.
//!
//! Wire format (JSON):
//!
//! ```json
//! { "topic":     "worker",
//!   "task_type": "rolling_upgrade",
//!   "message":   { "create_time": "2025-06-01T10:00:00Z",
//!                  "task_body":   { "...": "per-task-type payload" },
//!                  "user":        "ops" } }
//! ```
//!
//! Topics and task kinds are closed vocabularies so routing is total:
//! there is no default branch anywhere in the dispatch path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue topic. The first-class routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Runtime lifecycle operations (start, stop, upgrade, gc, ...).
    Worker,
    /// Source and image builds.
    Builder,
    /// Builds that must run on a Windows build host.
    WindowsBuilder,
}

impl Topic {
    /// The wire string, also used as the queue key suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Worker => "worker",
            Topic::Builder => "builder",
            Topic::WindowsBuilder => "windows_builder",
        }
    }
}

/// Task kind. Determines how the worker interprets `task_body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Build an artifact from source or image.
    Build,
    /// Start a component.
    Start,
    /// Stop a component.
    Stop,
    /// Restart a component.
    Restart,
    /// Upgrade a component to a new deploy version.
    RollingUpgrade,
    /// Reconcile a component's gateway rules into the data plane.
    ApplyRule,
    /// Push updated plugin dynamic config to the runtime.
    ApplyPluginConfig,
    /// Garbage-collect a component's runtime leftovers.
    ServiceGc,
    /// Inspect a build source and report what it is.
    ServiceCheck,
    /// Tear down a tenant and everything it owns.
    DeleteTenant,
}

impl TaskKind {
    /// The wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Build => "build",
            TaskKind::Start => "start",
            TaskKind::Stop => "stop",
            TaskKind::Restart => "restart",
            TaskKind::RollingUpgrade => "rolling_upgrade",
            TaskKind::ApplyRule => "apply_rule",
            TaskKind::ApplyPluginConfig => "apply_plugin_config",
            TaskKind::ServiceGc => "service_gc",
            TaskKind::ServiceCheck => "service_check",
            TaskKind::DeleteTenant => "delete_tenant",
        }
    }
}

/// The inner message of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// When the envelope was built, RFC3339.
    pub create_time: DateTime<Utc>,
    /// Opaque per-task-type payload.
    pub task_body: serde_json::Value,
    /// User the operation runs as.
    pub user: String,
}

/// One queued work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Routing key.
    pub topic: Topic,
    /// How the worker interprets the body.
    pub task_type: TaskKind,
    /// The payload.
    pub message: TaskMessage,
}

impl TaskEnvelope {
    /// Build an envelope stamped with the given creation time.
    pub fn new(
        topic: Topic,
        task_type: TaskKind,
        task_body: serde_json::Value,
        user: impl Into<String>,
        create_time: DateTime<Utc>,
    ) -> Self {
        Self {
            topic,
            task_type,
            message: TaskMessage {
                create_time,
                task_body,
                user: user.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_wire_strings() {
        assert_eq!(serde_json::to_string(&Topic::Worker).unwrap(), "\"worker\"");
        assert_eq!(
            serde_json::to_string(&Topic::WindowsBuilder).unwrap(),
            "\"windows_builder\""
        );
        for topic in [Topic::Worker, Topic::Builder, Topic::WindowsBuilder] {
            let wire = serde_json::to_string(&topic).unwrap();
            assert_eq!(wire, format!("\"{}\"", topic.as_str()));
        }
    }

    #[test]
    fn test_task_kind_wire_strings() {
        for kind in [
            TaskKind::Build,
            TaskKind::Start,
            TaskKind::Stop,
            TaskKind::Restart,
            TaskKind::RollingUpgrade,
            TaskKind::ApplyPluginConfig,
            TaskKind::ServiceGc,
            TaskKind::ServiceCheck,
            TaskKind::DeleteTenant,
        ] {
            let wire = serde_json::to_string(&kind).unwrap();
            assert_eq!(wire, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = TaskEnvelope::new(
            Topic::Builder,
            TaskKind::Build,
            json!({
                "event_id": "11f5e1a2-6d3f-4b61-9b9e-8e2f6e8a9c01",
                "service_id": "svc-1",
                "deploy_version": "20250601100000",
            }),
            "ops",
            "2025-06-01T10:00:00Z".parse().unwrap(),
        );
        let wire = serde_json::to_string(&envelope).unwrap();
        let back: TaskEnvelope = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.message.task_body["service_id"], "svc-1");
    }
}

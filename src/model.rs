//! The persisted configuration record for one managed consumer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Runtime status exposed to the operator. `ERROR` corresponds to the
/// Extractor-internal `FAILED` state (see `extractor::ExtractorStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsumerStatus {
    /// No Extractor exists for this id.
    Inactive,
    /// A live Extractor is running for this id.
    Active,
    /// The Extractor reached a fatal, unrecoverable state.
    Error,
}

/// One sink's declarative parameters. `config` is opaque to everything but
/// the matching Processor implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Identifier stable within the parent `ConsumerSpec`.
    pub id: Uuid,
    /// Tag used by the Processor Factory to pick a constructor.
    #[serde(rename = "type")]
    pub processor_type: String,
    /// Opaque, type-specific configuration.
    pub config: HashMap<String, Value>,
}

/// Declarative configuration of one managed consumer, as persisted by the
/// Specification Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerSpec {
    /// Stable opaque identifier, assigned at creation.
    pub id: Uuid,
    /// Kafka bootstrap host.
    pub broker_host: String,
    /// Kafka bootstrap port.
    pub broker_port: u16,
    /// Single topic this consumer subscribes to.
    pub topic: String,
    /// Kafka consumer group id.
    pub group_id: String,
    /// Optional client id forwarded to the Kafka client.
    pub client_id: Option<String>,
    /// Whether `create` should immediately start the Extractor. Only
    /// consulted at creation time.
    pub auto_start: bool,
    /// Ordered list of sinks the Extractor fans each record out to.
    pub processors: Vec<ProcessorConfig>,
    /// Authoritative runtime state.
    pub status: ConsumerStatus,
    /// Human-readable reason, set when `status` becomes `ERROR`.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ConsumerSpec {
    /// `broker_host:broker_port`, as handed to `rdkafka::ClientConfig`.
    pub fn bootstrap_servers(&self) -> String {
        format!("{}:{}", self.broker_host, self.broker_port)
    }
}

/// Draft submitted by the operator on `create`; server assigns `id`,
/// `status`, and timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerSpecDraft {
    /// Kafka bootstrap host.
    pub broker_host: String,
    /// Kafka bootstrap port.
    pub broker_port: u16,
    /// Single topic this consumer subscribes to.
    pub topic: String,
    /// Kafka consumer group id.
    pub group_id: String,
    /// Optional client id forwarded to the Kafka client.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Whether to start the Extractor immediately.
    #[serde(default)]
    pub auto_start: bool,
    /// Sinks to attach, in the order they should be invoked.
    #[serde(default)]
    pub processors: Vec<ProcessorConfigDraft>,
}

/// Draft of a sink submitted by the operator; server assigns `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfigDraft {
    /// Tag used by the Processor Factory to pick a constructor.
    #[serde(rename = "type")]
    pub processor_type: String,
    /// Opaque, type-specific configuration.
    #[serde(default)]
    pub config: HashMap<String, Value>,
}

/// Partial update accepted by `PUT /consumers/{id}`. Any field left `None`
/// is left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumerSpecPatch {
    /// New broker host, if changing.
    pub broker_host: Option<String>,
    /// New broker port, if changing.
    pub broker_port: Option<u16>,
    /// New topic, if changing.
    pub topic: Option<String>,
    /// New group id, if changing.
    pub group_id: Option<String>,
    /// New client id, if changing. `Some(None)` clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Option<String>>,
    /// New processor list, if changing.
    pub processors: Option<Vec<ProcessorConfigDraft>>,
}

impl ConsumerSpecPatch {
    /// Whether this patch changes the broker endpoint, topic, or group —
    /// fields that require a stop-then-start of the Extractor rather than a
    /// `replace_processors`.
    pub fn changes_connection(&self) -> bool {
        self.broker_host.is_some() || self.broker_port.is_some() || self.topic.is_some()
    }

    /// Whether this patch touches `group_id`, which also requires a
    /// stop-then-start since the Kafka client is bound to the group at
    /// construction time.
    pub fn changes_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// Whether this patch is a pure no-op (all fields absent).
    pub fn is_empty(&self) -> bool {
        self.broker_host.is_none()
            && self.broker_port.is_none()
            && self.topic.is_none()
            && self.group_id.is_none()
            && self.client_id.is_none()
            && self.processors.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_detects_connection_changes() {
        let mut patch = ConsumerSpecPatch::default();
        assert!(patch.is_empty());
        assert!(!patch.changes_connection());

        patch.topic = Some("new-topic".to_string());
        assert!(patch.changes_connection());
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_detects_group_changes_independently() {
        let mut patch = ConsumerSpecPatch::default();
        patch.group_id = Some("new-group".to_string());
        assert!(patch.changes_group());
        assert!(!patch.changes_connection());
    }

    #[test]
    fn bootstrap_servers_formats_host_and_port() {
        let spec = ConsumerSpec {
            id: Uuid::new_v4(),
            broker_host: "kafka.internal".to_string(),
            broker_port: 9092,
            topic: "t".to_string(),
            group_id: "g".to_string(),
            client_id: None,
            auto_start: false,
            processors: vec![],
            status: ConsumerStatus::Inactive,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(spec.bootstrap_servers(), "kafka.internal:9092");
    }
}

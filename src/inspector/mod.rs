//! Offset/Lag Inspector — read-only visibility into Kafka consumer groups.
//!
//! Every call constructs a short-lived `rdkafka::consumer::BaseConsumer`,
//! uses it for metadata/offset/watermark queries, and drops it before
//! returning. Inspector calls never touch a running Extractor's client and
//! may run concurrently with any number of Supervisor operations.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::{Offset, TopicPartitionList};
use thiserror::Error;

use crate::store::SpecStore;

/// Errors the Inspector can report.
#[derive(Debug, Error, Clone)]
pub enum InspectorError {
    /// Requested group or topic is unknown to the cluster.
    #[error("not found: {0}")]
    NotFound(String),
    /// Admin/consumer client construction failed.
    #[error("client init failed: {0}")]
    ClientInit(String),
    /// The call exceeded `INSPECTOR_TIMEOUT_SECONDS`.
    #[error("inspector call timed out")]
    TimedOut,
}

/// Result alias for Inspector operations.
pub type InspectorResult<T> = Result<T, InspectorError>;

/// Which group ids to report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScope {
    /// Only group ids referenced by a spec currently in the Store.
    Known,
    /// Every group id the cluster's admin API reports.
    All,
}

/// Committed offset and log-end offset for one partition, plus the
/// derived lag.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PartitionLag {
    /// Partition number.
    pub partition: i32,
    /// Last committed offset for this group, or `-1` if none has been
    /// committed yet.
    pub committed_offset: i64,
    /// High-water mark for this partition.
    pub log_end_offset: i64,
    /// `max(0, log_end_offset - max(committed_offset, 0))`.
    pub lag: i64,
}

/// Read-only window onto Kafka consumer groups.
pub struct OffsetLagInspector {
    store: std::sync::Arc<dyn SpecStore>,
    default_bootstrap_servers: String,
    timeout: Duration,
}

impl OffsetLagInspector {
    /// Build an Inspector that falls back to `default_bootstrap_servers`
    /// when a call does not supply its own.
    pub fn new(
        store: std::sync::Arc<dyn SpecStore>,
        default_bootstrap_servers: String,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            default_bootstrap_servers,
            timeout,
        }
    }

    fn base_consumer(&self, bootstrap_servers: &str, group_id: &str) -> InspectorResult<BaseConsumer> {
        ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .create()
            .map_err(|e: KafkaError| InspectorError::ClientInit(e.to_string()))
    }

    /// List group ids. `GroupScope::Known` reads every spec's `group_id`
    /// out of the Store (deduplicated); `GroupScope::All` asks the cluster.
    pub async fn list_groups(&self, scope: GroupScope, bootstrap_servers: Option<&str>) -> InspectorResult<Vec<String>> {
        match scope {
            GroupScope::Known => {
                let groups: HashSet<String> = self
                    .store
                    .list()
                    .into_iter()
                    .map(|spec| spec.group_id)
                    .collect();
                Ok(groups.into_iter().collect())
            }
            GroupScope::All => {
                let bootstrap = bootstrap_servers.unwrap_or(&self.default_bootstrap_servers);
                let consumer = self.base_consumer(bootstrap, "inspector-transient")?;
                let timeout = self.timeout;
                tokio::task::spawn_blocking(move || {
                    consumer
                        .fetch_group_list(None, timeout)
                        .map(|list| {
                            list.groups()
                                .iter()
                                .map(|g| g.name().to_string())
                                .collect()
                        })
                        .map_err(|e| InspectorError::ClientInit(e.to_string()))
                })
                .await
                .map_err(|_| InspectorError::TimedOut)?
            }
        }
    }

    /// Committed offsets for every partition of `group_id`'s subscribed
    /// topics, keyed by topic. Only partitions with an actual committed
    /// offset are included; a group that has never committed returns an
    /// empty map so callers can report `NotFound`.
    pub async fn committed_offsets(
        &self,
        group_id: &str,
        bootstrap_servers: Option<&str>,
    ) -> InspectorResult<HashMap<String, Vec<(i32, i64)>>> {
        let bootstrap = bootstrap_servers
            .unwrap_or(&self.default_bootstrap_servers)
            .to_string();
        let group_id = group_id.to_string();
        let timeout = self.timeout;
        let consumer = self.base_consumer(&bootstrap, &group_id)?;

        // Scope the metadata lookup to topics this group is known to
        // consume, rather than every topic in the cluster, when the Store
        // has a spec for it; fall back to a full scan for a group this
        // service didn't create.
        let known_topics: HashSet<String> = self
            .store
            .list()
            .into_iter()
            .filter(|spec| spec.group_id == group_id)
            .map(|spec| spec.topic)
            .collect();
        let scan_topic = if known_topics.len() == 1 {
            known_topics.into_iter().next()
        } else {
            None
        };

        tokio::task::spawn_blocking(move || {
            let metadata = consumer
                .fetch_metadata(scan_topic.as_deref(), timeout)
                .map_err(|e| InspectorError::ClientInit(e.to_string()))?;

            let mut tpl = TopicPartitionList::new();
            for topic in metadata.topics() {
                for partition in topic.partitions() {
                    tpl.add_partition(topic.name(), partition.id());
                }
            }

            let committed = consumer
                .committed_offsets(tpl, timeout)
                .map_err(|e| InspectorError::ClientInit(e.to_string()))?;

            let mut by_topic: HashMap<String, Vec<(i32, i64)>> = HashMap::new();
            for element in committed.elements() {
                if let Offset::Offset(offset) = element.offset() {
                    by_topic
                        .entry(element.topic().to_string())
                        .or_default()
                        .push((element.partition(), offset));
                }
            }
            Ok(by_topic)
        })
        .await
        .map_err(|_| InspectorError::TimedOut)?
    }

    /// Per-partition lag for `group_id` against `topic`:
    /// `lag = max(0, log_end_offset - current_offset)`, where an unset
    /// committed offset (`-1`) is treated as `current_offset = 0` so the
    /// lag equals the full log-end offset.
    pub async fn lag(
        &self,
        group_id: &str,
        topic: &str,
        bootstrap_servers: Option<&str>,
    ) -> InspectorResult<Vec<PartitionLag>> {
        let bootstrap = bootstrap_servers
            .unwrap_or(&self.default_bootstrap_servers)
            .to_string();
        let group_id_owned = group_id.to_string();
        let topic_owned = topic.to_string();
        let timeout = self.timeout;
        let consumer = self.base_consumer(&bootstrap, &group_id_owned)?;

        tokio::task::spawn_blocking(move || {
            let metadata = consumer
                .fetch_metadata(Some(&topic_owned), timeout)
                .map_err(|e| InspectorError::ClientInit(e.to_string()))?;

            let topic_metadata = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic_owned)
                .ok_or_else(|| InspectorError::NotFound(topic_owned.clone()))?;

            let mut tpl = TopicPartitionList::new();
            for partition in topic_metadata.partitions() {
                tpl.add_partition(&topic_owned, partition.id());
            }

            let committed = consumer
                .committed_offsets(tpl, timeout)
                .map_err(|e| InspectorError::ClientInit(e.to_string()))?;

            let mut results = Vec::new();
            for element in committed.elements() {
                let partition = element.partition();
                let committed_offset = match element.offset() {
                    Offset::Offset(o) => o,
                    _ => -1,
                };

                let (_, high) = consumer
                    .fetch_watermarks(&topic_owned, partition, timeout)
                    .map_err(|e| InspectorError::ClientInit(e.to_string()))?;

                let current = committed_offset.max(0);
                let lag = (high - current).max(0);

                results.push(PartitionLag {
                    partition,
                    committed_offset,
                    log_end_offset: high,
                    lag,
                });
            }

            Ok(results)
        })
        .await
        .map_err(|_| InspectorError::TimedOut)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_is_clamped_at_zero_when_caught_up() {
        let high = 100i64;
        let current = 100i64.max(0);
        assert_eq!((high - current).max(0), 0);
    }

    #[test]
    fn lag_treats_unset_commit_as_full_log() {
        let high = 42i64;
        let committed_offset = -1i64;
        let current = committed_offset.max(0);
        assert_eq!((high - current).max(0), 42);
    }
}

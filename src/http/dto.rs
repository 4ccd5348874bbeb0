//! Request/response bodies for the HTTP surface. Kept separate from
//! [`crate::model`] so the wire shape can diverge from the Store's
//! persisted shape without touching either.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::inspector::PartitionLag;

/// Body of `POST /consumers/{id}/start` and `.../stop` responses.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// The consumer's id.
    pub id: Uuid,
    /// Its status after the operation.
    pub status: crate::model::ConsumerStatus,
}

/// Body of `GET /consumergroups/`.
#[derive(Debug, Serialize)]
pub struct ConsumerGroupsResponse {
    /// Group ids in scope.
    pub consumer_groups: Vec<String>,
}

/// One row of `GET /consumergroups/{group_id}/offsets`.
#[derive(Debug, Serialize)]
pub struct OffsetEntry {
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Last committed offset, or `-1` if none.
    pub current_offset: i64,
    /// Always `null` in this implementation; reserved by the wire format
    /// for broker-supplied commit metadata.
    pub metadata: Option<String>,
}

/// Body of `GET /consumergroups/{group_id}/offsets`.
#[derive(Debug, Serialize)]
pub struct GroupOffsetsResponse {
    /// The group id queried.
    pub group_id: String,
    /// One entry per partition across all of the group's topics.
    pub offsets: Vec<OffsetEntry>,
}

/// Query parameters for `GET /consumergroups/`.
#[derive(Debug, serde::Deserialize)]
pub struct ListGroupsQuery {
    /// `true` to list every group the cluster reports; `false` (default)
    /// to list only group ids referenced by a known spec.
    #[serde(default)]
    pub all_groups: bool,
}

/// Query parameters shared by the two `/monitor/...` endpoints.
#[derive(Debug, serde::Deserialize)]
pub struct MonitorQuery {
    /// Consumer group id to inspect.
    pub group_id: String,
    /// Topic to inspect. Required for the lag endpoint, ignored by the
    /// offsets endpoint.
    #[serde(default)]
    pub topic: Option<String>,
    /// Override for `KAFKA_BOOTSTRAP_SERVERS`.
    #[serde(default)]
    pub bootstrap_servers: Option<String>,
}

/// Body of `GET /monitor/consumer-group-offsets`:
/// `{topic: {partition: offset}}`.
pub type OffsetsByTopic = HashMap<String, HashMap<i32, i64>>;

/// Body of `GET /monitor/consumer-group-lag`:
/// `{partition: {current_offset, log_end_offset, lag}}`.
pub type LagByPartition = HashMap<i32, LagEntry>;

/// One partition's lag figures, as exposed on the wire.
#[derive(Debug, Serialize)]
pub struct LagEntry {
    /// Last committed offset, or `-1` if none.
    pub current_offset: i64,
    /// High-water mark.
    pub log_end_offset: i64,
    /// `max(0, log_end_offset - max(current_offset, 0))`.
    pub lag: i64,
}

impl From<PartitionLag> for LagEntry {
    fn from(p: PartitionLag) -> Self {
        Self {
            current_offset: p.committed_offset,
            log_end_offset: p.log_end_offset,
            lag: p.lag,
        }
    }
}

//! Route handlers. Each one validates its own input shape and otherwise
//! defers entirely to the Supervisor or Inspector — no business logic
//! lives here.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::inspector::GroupScope;
use crate::model::{ConsumerSpec, ConsumerSpecDraft, ConsumerSpecPatch};

use super::dto::{
    ConsumerGroupsResponse, GroupOffsetsResponse, LagByPartition, LagEntry, ListGroupsQuery,
    MonitorQuery, OffsetEntry, OffsetsByTopic, StatusResponse,
};
use super::AppState;

pub async fn list_consumers(State(state): State<AppState>) -> Json<Vec<ConsumerSpec>> {
    Json(state.supervisor.list())
}

pub async fn create_consumer(
    State(state): State<AppState>,
    Json(draft): Json<ConsumerSpecDraft>,
) -> ApiResult<(StatusCode, Json<ConsumerSpec>)> {
    let spec = state.supervisor.create(draft).await?;
    Ok((StatusCode::CREATED, Json(spec)))
}

pub async fn get_consumer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConsumerSpec>> {
    Ok(Json(state.supervisor.get(id)?))
}

pub async fn update_consumer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ConsumerSpecPatch>,
) -> ApiResult<Json<ConsumerSpec>> {
    Ok(Json(state.supervisor.update(id, patch).await?))
}

pub async fn start_consumer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    let spec = state.supervisor.start(id).await?;
    Ok(Json(StatusResponse {
        id: spec.id,
        status: spec.status,
    }))
}

pub async fn stop_consumer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    let spec = state.supervisor.stop(id).await?;
    Ok(Json(StatusResponse {
        id: spec.id,
        status: spec.status,
    }))
}

pub async fn delete_consumer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.supervisor.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_consumer_groups(
    State(state): State<AppState>,
    Query(query): Query<ListGroupsQuery>,
) -> ApiResult<Json<ConsumerGroupsResponse>> {
    let scope = if query.all_groups {
        GroupScope::All
    } else {
        GroupScope::Known
    };
    let groups = state.inspector.list_groups(scope, None).await?;
    Ok(Json(ConsumerGroupsResponse {
        consumer_groups: groups,
    }))
}

pub async fn group_offsets(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> ApiResult<Json<GroupOffsetsResponse>> {
    let by_topic = state.inspector.committed_offsets(&group_id, None).await?;
    if by_topic.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no committed offsets for group {group_id}"
        )));
    }

    let offsets = by_topic
        .into_iter()
        .flat_map(|(topic, partitions)| {
            partitions.into_iter().map(move |(partition, offset)| OffsetEntry {
                topic: topic.clone(),
                partition,
                current_offset: offset,
                metadata: None,
            })
        })
        .collect();

    Ok(Json(GroupOffsetsResponse { group_id, offsets }))
}

pub async fn monitor_offsets(
    State(state): State<AppState>,
    Query(query): Query<MonitorQuery>,
) -> ApiResult<Json<OffsetsByTopic>> {
    let by_topic = state
        .inspector
        .committed_offsets(&query.group_id, query.bootstrap_servers.as_deref())
        .await?;
    if by_topic.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no committed offsets for group {}",
            query.group_id
        )));
    }

    let mut response: OffsetsByTopic = HashMap::new();
    for (topic, partitions) in by_topic {
        response.insert(topic, partitions.into_iter().collect());
    }
    Ok(Json(response))
}

pub async fn monitor_lag(
    State(state): State<AppState>,
    Query(query): Query<MonitorQuery>,
) -> ApiResult<Json<LagByPartition>> {
    let topic = query
        .topic
        .ok_or_else(|| ApiError::BadConfig("`topic` query parameter is required".to_string()))?;

    let lags = state
        .inspector
        .lag(&query.group_id, &topic, query.bootstrap_servers.as_deref())
        .await?;

    let response: LagByPartition = lags
        .into_iter()
        .map(|l| (l.partition, LagEntry::from(l)))
        .collect();
    Ok(Json(response))
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    if state.ready.load(std::sync::atomic::Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

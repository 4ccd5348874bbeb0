//! In-memory reference implementation of [`SpecStore`].

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{SpecStore, StoreError, StoreResult};
use crate::model::{ConsumerSpec, ConsumerSpecPatch, ConsumerStatus};

/// `DashMap`-backed Store. Safe to share behind an `Arc` across the
/// Supervisor and the Inspector; every method locks only the shard for the
/// key it touches.
#[derive(Default)]
pub struct InMemorySpecStore {
    specs: DashMap<Uuid, ConsumerSpec>,
}

impl InMemorySpecStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpecStore for InMemorySpecStore {
    fn create(&self, spec: ConsumerSpec) -> StoreResult<ConsumerSpec> {
        if self.specs.contains_key(&spec.id) {
            return Err(StoreError::Conflict(format!(
                "spec {} already exists",
                spec.id
            )));
        }
        self.specs.insert(spec.id, spec.clone());
        Ok(spec)
    }

    fn get(&self, id: Uuid) -> StoreResult<ConsumerSpec> {
        self.specs
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list(&self) -> Vec<ConsumerSpec> {
        self.specs.iter().map(|entry| entry.clone()).collect()
    }

    fn update(&self, id: Uuid, patch: &ConsumerSpecPatch) -> StoreResult<ConsumerSpec> {
        let mut entry = self
            .specs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(host) = &patch.broker_host {
            entry.broker_host = host.clone();
        }
        if let Some(port) = patch.broker_port {
            entry.broker_port = port;
        }
        if let Some(topic) = &patch.topic {
            entry.topic = topic.clone();
        }
        if let Some(group_id) = &patch.group_id {
            entry.group_id = group_id.clone();
        }
        if let Some(client_id) = &patch.client_id {
            entry.client_id = client_id.clone();
        }
        if let Some(processors) = &patch.processors {
            entry.processors = processors
                .iter()
                .map(|draft| crate::model::ProcessorConfig {
                    id: Uuid::new_v4(),
                    processor_type: draft.processor_type.clone(),
                    config: draft.config.clone(),
                })
                .collect();
        }
        entry.updated_at = Utc::now();

        Ok(entry.clone())
    }

    fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.specs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn set_status(
        &self,
        id: Uuid,
        status: ConsumerStatus,
        last_error: Option<String>,
    ) -> StoreResult<ConsumerSpec> {
        let mut entry = self
            .specs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.status = status;
        entry.last_error = if matches!(status, ConsumerStatus::Error) {
            last_error
        } else {
            None
        };
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> ConsumerSpec {
        let now = Utc::now();
        ConsumerSpec {
            id: Uuid::new_v4(),
            broker_host: "localhost".to_string(),
            broker_port: 9092,
            topic: "t".to_string(),
            group_id: "g".to_string(),
            client_id: None,
            auto_start: false,
            processors: vec![],
            status: ConsumerStatus::Inactive,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = InMemorySpecStore::new();
        let spec = sample_spec();
        let id = spec.id;
        store.create(spec.clone()).unwrap();

        let fetched = store.get(id).unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.topic, "t");
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let store = InMemorySpecStore::new();
        let spec = sample_spec();
        store.create(spec.clone()).unwrap();

        let err = store.create(spec).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemorySpecStore::new();
        let err = store.get(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let store = InMemorySpecStore::new();
        let spec = sample_spec();
        let id = spec.id;
        store.create(spec).unwrap();

        store.delete(id).unwrap();
        assert!(matches!(store.get(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn empty_patch_is_a_no_op_besides_timestamp() {
        let store = InMemorySpecStore::new();
        let spec = sample_spec();
        let id = spec.id;
        let original_topic = spec.topic.clone();
        store.create(spec).unwrap();

        let updated = store.update(id, &ConsumerSpecPatch::default()).unwrap();
        assert_eq!(updated.topic, original_topic);
    }

    #[test]
    fn set_status_error_records_last_error_and_clears_on_recovery() {
        let store = InMemorySpecStore::new();
        let spec = sample_spec();
        let id = spec.id;
        store.create(spec).unwrap();

        let errored = store
            .set_status(id, ConsumerStatus::Error, Some("boom".to_string()))
            .unwrap();
        assert_eq!(errored.status, ConsumerStatus::Error);
        assert_eq!(errored.last_error.as_deref(), Some("boom"));

        let recovered = store.set_status(id, ConsumerStatus::Active, None).unwrap();
        assert_eq!(recovered.status, ConsumerStatus::Active);
        assert!(recovered.last_error.is_none());
    }
}

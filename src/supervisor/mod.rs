//! Consumer Supervisor — the in-process registry and lifecycle engine.
//!
//! Registry entries are `Arc<tokio::sync::Mutex<ConsumerEntry>>` inside a
//! `DashMap<Uuid, Arc<Mutex<ConsumerEntry>>>`: locking one entry's mutex
//! serializes mutations against that id while distinct ids proceed fully
//! concurrently, since they never contend on the same map shard's lock for
//! longer than the shard lookup itself. Reads (`get`/`list`) go straight to
//! the Store and never take an entry's mutex, so they may observe a spec
//! mid-transition, as specified.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::extractor::{Extractor, ExtractorStatus};
use crate::model::{ConsumerSpec, ConsumerSpecDraft, ConsumerSpecPatch, ConsumerStatus, ProcessorConfig};
use crate::processor::factory::ProcessorFactory;
use crate::processor::Processor;
use crate::store::SpecStore;

/// Per-id registry slot. `None` means no live Extractor exists for this id
/// (status is INACTIVE or ERROR in the Store).
struct ConsumerEntry {
    extractor: Option<Extractor>,
}

/// Process-wide registry `{consumer_id -> Extractor}`, serializing mutating
/// operations per id and implementing the ACTIVE/INACTIVE/ERROR state
/// machine described in the data model.
pub struct ConsumerSupervisor {
    store: Arc<dyn SpecStore>,
    factory: Arc<ProcessorFactory>,
    config: AppConfig,
    registry: DashMap<Uuid, Arc<Mutex<ConsumerEntry>>>,
}

impl ConsumerSupervisor {
    /// Build a Supervisor around a Store, Factory, and process config. The
    /// registry starts empty regardless of what the Store already holds —
    /// a restart always begins with every consumer INACTIVE until an
    /// operator (or a persisted `auto_start`, for a durable Store) brings
    /// it back up.
    pub fn new(store: Arc<dyn SpecStore>, factory: Arc<ProcessorFactory>, config: AppConfig) -> Self {
        Self {
            store,
            factory,
            config,
            registry: DashMap::new(),
        }
    }

    fn entry_for(&self, id: Uuid) -> Arc<Mutex<ConsumerEntry>> {
        self.registry
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(ConsumerEntry { extractor: None })))
            .clone()
    }

    /// Build the Processor list for a spec via the Factory. All-or-nothing:
    /// the first failure aborts construction of the rest.
    fn build_processors(&self, spec: &ConsumerSpec) -> ApiResult<Vec<Arc<dyn Processor>>> {
        spec.processors
            .iter()
            .map(|p: &ProcessorConfig| {
                self.factory
                    .build(&p.processor_type, &p.config)
                    .map_err(|e| match e {
                        crate::processor::factory::FactoryError::UnknownType(t) => {
                            ApiError::UnknownType(t)
                        }
                        crate::processor::factory::FactoryError::BadConfig(msg) => {
                            ApiError::BadConfig(msg)
                        }
                    })
            })
            .collect()
    }

    fn spawn_extractor(&self, spec: &ConsumerSpec, processors: Vec<Arc<dyn Processor>>) -> ApiResult<Extractor> {
        Extractor::start(
            spec.id,
            &spec.bootstrap_servers(),
            &spec.topic,
            &spec.group_id,
            spec.client_id.as_deref(),
            self.config.poll_timeout,
            self.config.stop_timeout,
            processors,
        )
        .map_err(ApiError::from)
    }

    /// Assign an id, persist via the Store, build Processors, and —
    /// if `auto_start` — start the Extractor immediately.
    pub async fn create(&self, draft: ConsumerSpecDraft) -> ApiResult<ConsumerSpec> {
        let now = chrono::Utc::now();
        let id = Uuid::new_v4();
        let processors = draft
            .processors
            .into_iter()
            .map(|p| ProcessorConfig {
                id: Uuid::new_v4(),
                processor_type: p.processor_type,
                config: p.config,
            })
            .collect();

        let mut spec = ConsumerSpec {
            id,
            broker_host: draft.broker_host,
            broker_port: draft.broker_port,
            topic: draft.topic,
            group_id: draft.group_id,
            client_id: draft.client_id,
            auto_start: draft.auto_start,
            processors,
            status: ConsumerStatus::Inactive,
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        let built = if spec.auto_start {
            Some(self.build_processors(&spec)?)
        } else {
            None
        };

        spec = self.store.create(spec)?;

        if let Some(processors) = built {
            let entry = self.entry_for(id);
            let mut guard = entry.lock().await;
            match self.spawn_extractor(&spec, processors) {
                Ok(extractor) => {
                    guard.extractor = Some(extractor);
                    spec = self.store.set_status(id, ConsumerStatus::Active, None)?;
                }
                Err(err) => {
                    spec = self
                        .store
                        .set_status(id, ConsumerStatus::Error, Some(err.to_string()))?;
                }
            }
        }

        Ok(spec)
    }

    /// Fetch a spec. Never touches the registry; the Store is authoritative.
    pub fn get(&self, id: Uuid) -> ApiResult<ConsumerSpec> {
        Ok(self.store.get(id)?)
    }

    /// All known specs.
    pub fn list(&self) -> Vec<ConsumerSpec> {
        self.store.list()
    }

    /// Start the Extractor for `id`. A no-op returning the current spec if
    /// already ACTIVE. A FAILED (ERROR) Extractor is discarded and a fresh
    /// build is attempted, giving the operator a recovery path without a
    /// delete/create round trip.
    pub async fn start(&self, id: Uuid) -> ApiResult<ConsumerSpec> {
        let entry = self.entry_for(id);
        let mut guard = entry.lock().await;

        let spec = self.store.get(id)?;
        if spec.status == ConsumerStatus::Active {
            return Ok(spec);
        }

        if let Some(extractor) = guard.extractor.take() {
            // Stale FAILED extractor from a previous run; stop is a no-op
            // drain since the poll task has already exited.
            let _ = extractor.stop().await;
        }

        let processors = self.build_processors(&spec)?;
        match self.spawn_extractor(&spec, processors) {
            Ok(extractor) => {
                guard.extractor = Some(extractor);
                Ok(self.store.set_status(id, ConsumerStatus::Active, None)?)
            }
            Err(err) => Ok(self
                .store
                .set_status(id, ConsumerStatus::Error, Some(err.to_string()))?),
        }
    }

    /// Stop the Extractor for `id`. A no-op returning the current spec if
    /// already INACTIVE.
    pub async fn stop(&self, id: Uuid) -> ApiResult<ConsumerSpec> {
        let entry = self.entry_for(id);
        let mut guard = entry.lock().await;

        let spec = self.store.get(id)?;
        if spec.status == ConsumerStatus::Inactive {
            return Ok(spec);
        }

        match guard.extractor.take() {
            Some(extractor) => match extractor.stop().await {
                Ok(()) => Ok(self.store.set_status(id, ConsumerStatus::Inactive, None)?),
                Err(err) => Ok(self
                    .store
                    .set_status(id, ConsumerStatus::Error, Some(err.to_string()))?),
            },
            None => Ok(self.store.set_status(id, ConsumerStatus::Inactive, None)?),
        }
    }

    /// Apply a patch. If the processor list changed and the consumer is
    /// ACTIVE, the running Extractor's Processors are swapped in place via
    /// `replace_processors` — the Kafka client and its subscription are
    /// untouched, so no rebalance. If the broker/topic/group changed and
    /// the consumer is ACTIVE, the Extractor is fully stopped and
    /// restarted against the new spec.
    pub async fn update(&self, id: Uuid, patch: ConsumerSpecPatch) -> ApiResult<ConsumerSpec> {
        let entry = self.entry_for(id);
        let mut guard = entry.lock().await;

        let before = self.store.get(id)?;
        let was_active = before.status == ConsumerStatus::Active;
        let needs_restart = patch.changes_connection() || patch.changes_group();
        let replaces_processors = patch.processors.is_some();

        let updated = self.store.update(id, &patch)?;

        if !was_active {
            return Ok(updated);
        }

        if needs_restart {
            if let Some(extractor) = guard.extractor.take() {
                let _ = extractor.stop().await;
            }
            let processors = self.build_processors(&updated)?;
            match self.spawn_extractor(&updated, processors) {
                Ok(extractor) => {
                    guard.extractor = Some(extractor);
                    return Ok(self.store.set_status(id, ConsumerStatus::Active, None)?);
                }
                Err(err) => {
                    return Ok(self
                        .store
                        .set_status(id, ConsumerStatus::Error, Some(err.to_string()))?)
                }
            }
        }

        if replaces_processors {
            let processors = self.build_processors(&updated)?;
            match &guard.extractor {
                Some(extractor) => {
                    extractor.replace_processors(processors).await;
                    return Ok(updated);
                }
                None => match self.spawn_extractor(&updated, processors) {
                    Ok(extractor) => {
                        guard.extractor = Some(extractor);
                        return Ok(self.store.set_status(id, ConsumerStatus::Active, None)?);
                    }
                    Err(err) => {
                        return Ok(self
                            .store
                            .set_status(id, ConsumerStatus::Error, Some(err.to_string()))?)
                    }
                },
            }
        }

        Ok(updated)
    }

    /// Stop if ACTIVE, then remove from both the registry and the Store.
    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        let entry = self.entry_for(id);
        {
            let mut guard = entry.lock().await;
            if let Some(extractor) = guard.extractor.take() {
                let _ = extractor.stop().await;
            }
        }
        self.store.delete(id)?;
        self.registry.remove(&id);
        Ok(())
    }

    /// Current Extractor-internal status for `id`, for diagnostics; the
    /// Store's `status` field remains the field callers should trust.
    pub async fn extractor_status(&self, id: Uuid) -> Option<ExtractorStatus> {
        let entry = self.registry.get(&id)?.clone();
        let guard = entry.lock().await;
        match &guard.extractor {
            Some(extractor) => Some(extractor.status().await),
            None => None,
        }
    }

    /// Stop every Extractor concurrently, each bounded by `stop_timeout`,
    /// then allow the Store to be dropped by the caller. Used on graceful
    /// process shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.registry.iter().map(|entry| *entry.key()).collect();
        let stops = ids.into_iter().map(|id| async move {
            let entry = self.entry_for(id);
            let mut guard = entry.lock().await;
            if let Some(extractor) = guard.extractor.take() {
                if let Err(err) = tokio::time::timeout(
                    self.config.stop_timeout + Duration::from_secs(1),
                    extractor.stop(),
                )
                .await
                .unwrap_or(Err(crate::extractor::ExtractorError::StopTimedOut))
                {
                    warn!(consumer_id = %id, error = %err, "extractor failed to stop cleanly during shutdown");
                }
            }
        });
        futures::future::join_all(stops).await;
        info!("supervisor shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemorySpecStore;

    fn supervisor() -> ConsumerSupervisor {
        ConsumerSupervisor::new(
            Arc::new(InMemorySpecStore::new()),
            Arc::new(ProcessorFactory::default()),
            test_config(),
        )
    }

    fn test_config() -> AppConfig {
        AppConfig {
            kafka_bootstrap_servers: "localhost:9092".to_string(),
            http_bind_addr: "0.0.0.0:8080".parse().unwrap(),
            stop_timeout: Duration::from_secs(5),
            poll_timeout: Duration::from_millis(100),
            inspector_timeout: Duration::from_secs(5),
            log_level: "INFO".to_string(),
            log_format: crate::config::LogFormat::Text,
        }
    }

    fn draft() -> ConsumerSpecDraft {
        ConsumerSpecDraft {
            broker_host: "localhost".to_string(),
            broker_port: 9092,
            topic: "t".to_string(),
            group_id: "g".to_string(),
            client_id: None,
            auto_start: false,
            processors: vec![],
        }
    }

    #[tokio::test]
    async fn create_without_auto_start_is_inactive() {
        let supervisor = supervisor();
        let spec = supervisor.create(draft()).await.unwrap();
        assert_eq!(spec.status, ConsumerStatus::Inactive);
    }

    #[tokio::test]
    async fn delete_missing_id_is_not_found() {
        let supervisor = supervisor();
        let err = supervisor.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn stop_on_inactive_consumer_is_a_no_op() {
        let supervisor = supervisor();
        let spec = supervisor.create(draft()).await.unwrap();
        let stopped = supervisor.stop(spec.id).await.unwrap();
        assert_eq!(stopped.status, ConsumerStatus::Inactive);
    }

    #[tokio::test]
    async fn update_with_no_fields_leaves_status_untouched() {
        let supervisor = supervisor();
        let spec = supervisor.create(draft()).await.unwrap();
        let updated = supervisor
            .update(spec.id, ConsumerSpecPatch::default())
            .await
            .unwrap();
        assert_eq!(updated.status, ConsumerStatus::Inactive);
    }

    #[tokio::test]
    async fn get_surfaces_store_io_failure() {
        use crate::store::{MockSpecStore, StoreError};

        let mut mock = MockSpecStore::new();
        mock.expect_get()
            .returning(|_| Err(StoreError::Io("connection reset".to_string())));

        let supervisor = ConsumerSupervisor::new(Arc::new(mock), Arc::new(ProcessorFactory::default()), test_config());

        let err = supervisor.get(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApiError::StoreIO(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn start_surfaces_store_io_failure_from_initial_get() {
        use crate::store::{MockSpecStore, StoreError};

        let mut mock = MockSpecStore::new();
        mock.expect_get()
            .returning(|_| Err(StoreError::Io("pool exhausted".to_string())));

        let supervisor = ConsumerSupervisor::new(Arc::new(mock), Arc::new(ProcessorFactory::default()), test_config());

        let err = supervisor.start(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::StoreIO(msg) if msg == "pool exhausted"));
    }
}

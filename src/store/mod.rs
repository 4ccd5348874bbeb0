//! Specification Store — the durable record of consumer specs.
//!
//! The contract is deliberately narrow: CRUD plus `set_status`, all
//! synchronous and individually atomic. The reference implementation
//! ([`memory::InMemorySpecStore`]) is a `DashMap`; the trait is
//! object-safe so a durable backend can be substituted without touching
//! the Supervisor.

pub mod memory;

use thiserror::Error;
use uuid::Uuid;

use crate::model::{ConsumerSpec, ConsumerSpecPatch, ConsumerStatus};

/// Errors the Store may report. All three map onto the taxonomy in the
/// design doc (`NotFound`, `Conflict`, `StoreIO`).
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// No spec with this id exists.
    #[error("no consumer spec with id {0}")]
    NotFound(String),
    /// The operation would violate a Store invariant (e.g. duplicate id).
    #[error("conflict: {0}")]
    Conflict(String),
    /// The backing storage failed.
    #[error("store I/O error: {0}")]
    Io(String),
}

/// Result alias for Store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable record of consumer specs. Every method is synchronous per the
/// design: the in-memory implementation never awaits, and a durable
/// implementation is expected to do its own internal blocking-to-async
/// bridging rather than exposing it here.
#[cfg_attr(test, mockall::automock)]
pub trait SpecStore: Send + Sync {
    /// Persist a brand new spec. Fails with `Conflict` if `spec.id` is
    /// already known.
    fn create(&self, spec: ConsumerSpec) -> StoreResult<ConsumerSpec>;

    /// Fetch a spec by id.
    fn get(&self, id: Uuid) -> StoreResult<ConsumerSpec>;

    /// All specs currently known, in unspecified order.
    fn list(&self) -> Vec<ConsumerSpec>;

    /// Apply a partial patch, bumping `updated_at`. Does not touch `status`.
    fn update(&self, id: Uuid, patch: &ConsumerSpecPatch) -> StoreResult<ConsumerSpec>;

    /// Remove a spec entirely.
    fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Set the authoritative runtime status (and `last_error` when
    /// transitioning to `ERROR`, cleared otherwise).
    fn set_status(
        &self,
        id: Uuid,
        status: ConsumerStatus,
        last_error: Option<String>,
    ) -> StoreResult<ConsumerSpec>;
}

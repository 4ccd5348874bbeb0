//! Processor Pipeline — one sink strategy per downstream destination.
//!
//! A [`Processor`] never back-references its owning consumer; the
//! [`Extractor`](crate::extractor::Extractor) injects whatever context a
//! record needs. Processors are built exclusively through the
//! [`ProcessorFactory`](factory::ProcessorFactory), which is the sole
//! construction site and is closed to modification once the process has
//! started.

pub mod database_sync;
pub mod factory;
pub mod file_sink;
pub mod streaming_forwarder;

use async_trait::async_trait;
use thiserror::Error;

/// One Kafka record handed to every Processor in declared order.
#[derive(Debug, Clone)]
pub struct Record {
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Message key, if present.
    pub key: Option<Vec<u8>>,
    /// Message payload.
    pub value: Vec<u8>,
    /// Kafka-assigned timestamp, in milliseconds since the epoch, if known.
    pub timestamp: Option<i64>,
}

/// A Processor failure, distinguishing retryable conditions from
/// permanent, configuration-shaped ones. The Extractor logs and moves on
/// either way — see the failure policy in the component design.
#[derive(Debug, Error, Clone)]
pub enum ProcessorError {
    /// Worth retrying (network blip, connection pool exhaustion).
    #[error("transient processor failure: {0}")]
    Transient(String),
    /// Not worth retrying (bad schema, malformed config, 4xx response).
    #[error("permanent processor failure: {0}")]
    Permanent(String),
}

impl ProcessorError {
    /// Whether the Extractor's retry budget (used by
    /// `streaming_forwarder`, and honored generically by the loop) should
    /// attempt this record again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessorError::Transient(_))
    }
}

/// A single sink strategy. Implementations MUST be safe to `close()` after
/// any number of `process` calls, including zero.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Consume one record. A failure here never propagates to peer
    /// Processors or stops the Extractor's loop.
    async fn process(&self, record: &Record) -> Result<(), ProcessorError>;

    /// Release any held resources (file handles, connection pools, HTTP
    /// clients). Called once, when the Extractor stops or the processor
    /// list is replaced.
    async fn close(&self);
}

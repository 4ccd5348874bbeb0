//! Message Extractor — one running consumer: a Kafka client, a poll loop,
//! and a list of Processors.
//!
//! A single Tokio task owns the `StreamConsumer` and drives a
//! `tokio::select!` between the next record and a cancellation signal.
//! Each record is dispatched to every Processor synchronously, in the
//! poll task itself — there is no distributor stage, no per-record
//! parallelism in the core. The Processor list lives behind a
//! `tokio::sync::RwLock` shared with the poll task so `replace_processors`
//! can swap it in place without stopping the client or its subscription.

pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::processor::{Processor, Record};

/// Errors an Extractor can report to its Supervisor.
#[derive(Debug, Error, Clone)]
pub enum ExtractorError {
    /// Kafka client construction or subscribe failed.
    #[error("kafka client init failed: {0}")]
    ClientInit(String),
    /// `stop` did not complete within the configured bound.
    #[error("stop timed out")]
    StopTimedOut,
    /// The poll loop hit an unrecoverable Kafka error at runtime.
    #[error("fatal extractor error: {0}")]
    Fatal(String),
}

/// Result alias for Extractor operations.
pub type ExtractorResult<T> = Result<T, ExtractorError>;

/// Extractor-internal state, as observed from outside the poll task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractorStatus {
    /// The poll task is alive.
    Running,
    /// `stop()` completed and the task has exited cleanly.
    Stopped,
    /// The poll task exited on a fatal Kafka error. Terminal: the
    /// Supervisor must discard this Extractor and build a fresh one.
    Failed(String),
}

/// One running consumer. Owns its Kafka client, poll task, and Processor
/// list exclusively; nothing outside the Extractor touches any of them.
pub struct Extractor {
    consumer_id: Uuid,
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    failure: Arc<Mutex<Option<String>>>,
    stop_timeout: Duration,
    processors: Arc<RwLock<Vec<Arc<dyn Processor>>>>,
}

impl Extractor {
    /// Build a Kafka client, subscribe to `topic`, and spawn the poll task.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        consumer_id: Uuid,
        bootstrap_servers: &str,
        topic: &str,
        group_id: &str,
        client_id: Option<&str>,
        poll_timeout: Duration,
        stop_timeout: Duration,
        processors: Vec<Arc<dyn Processor>>,
    ) -> ExtractorResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest");
        if let Some(client_id) = client_id {
            client_config.set("client.id", client_id);
        }

        let consumer: StreamConsumer = client_config
            .create()
            .map_err(|e| ExtractorError::ClientInit(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| ExtractorError::ClientInit(e.to_string()))?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let failure = Arc::new(Mutex::new(None));
        let processors = Arc::new(RwLock::new(processors));

        let task = tokio::spawn(poll_loop(
            consumer_id,
            consumer,
            processors.clone(),
            poll_timeout,
            cancel_rx,
            failure.clone(),
        ));

        Ok(Self {
            consumer_id,
            cancel_tx,
            task: Some(task),
            failure,
            stop_timeout,
            processors,
        })
    }

    /// Swap the running Processor list without tearing down the Kafka
    /// client or its subscription — no rebalance. The new list becomes
    /// visible to the poll loop atomically; the old Processors are closed
    /// only after the new ones are already in place.
    pub async fn replace_processors(&self, new_processors: Vec<Arc<dyn Processor>>) {
        let old = {
            let mut guard = self.processors.write().await;
            std::mem::replace(&mut *guard, new_processors)
        };
        for processor in old {
            processor.close().await;
        }
    }

    /// Signal cancellation and wait for the poll task to drain, close the
    /// client, and close every Processor. Idempotent: calling this twice
    /// on an already-stopped Extractor is a no-op.
    pub async fn stop(mut self) -> ExtractorResult<()> {
        let _ = self.cancel_tx.send(true);
        match self.task.take() {
            Some(task) => match tokio::time::timeout(self.stop_timeout, task).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(join_err)) => {
                    error!(consumer_id = %self.consumer_id, error = %join_err, "extractor task panicked");
                    Err(ExtractorError::Fatal(join_err.to_string()))
                }
                Err(_) => {
                    warn!(consumer_id = %self.consumer_id, "stop exceeded stop_timeout, abandoning task");
                    Err(ExtractorError::StopTimedOut)
                }
            },
            None => Ok(()),
        }
    }

    /// Current state, determined by whether the poll task has exited and,
    /// if so, whether it recorded a fatal error before doing so.
    pub async fn status(&self) -> ExtractorStatus {
        match &self.task {
            Some(task) if !task.is_finished() => ExtractorStatus::Running,
            Some(_) | None => match self.failure.lock().await.clone() {
                Some(reason) => ExtractorStatus::Failed(reason),
                None => ExtractorStatus::Stopped,
            },
        }
    }
}

async fn poll_loop(
    consumer_id: Uuid,
    consumer: StreamConsumer,
    processors: Arc<RwLock<Vec<Arc<dyn Processor>>>>,
    poll_timeout: Duration,
    mut cancel_rx: watch::Receiver<bool>,
    failure: Arc<Mutex<Option<String>>>,
) {
    loop {
        tokio::select! {
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
            }
            outcome = tokio::time::timeout(poll_timeout, consumer.recv()) => {
                match outcome {
                    // Poll timeout elapsed with no record; loop back around
                    // so the cancellation branch gets re-polled promptly.
                    Err(_elapsed) => continue,
                    Ok(Err(err)) => {
                        if is_fatal(&err) {
                            error!(consumer_id = %consumer_id, error = %err, "fatal kafka client error");
                            *failure.lock().await = Some(err.to_string());
                            break;
                        }
                        warn!(consumer_id = %consumer_id, error = %err, "transient kafka error, continuing");
                    }
                    Ok(Ok(message)) => {
                        let record = Record {
                            topic: message.topic().to_string(),
                            partition: message.partition(),
                            offset: message.offset(),
                            key: message.key().map(|k| k.to_vec()),
                            value: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
                            timestamp: message.timestamp().to_millis(),
                        };

                        let guard = processors.read().await;
                        for processor in guard.iter() {
                            if let Err(err) = processor.process(&record).await {
                                warn!(
                                    consumer_id = %consumer_id,
                                    offset = record.offset,
                                    error = %err,
                                    "processor failed, continuing to next processor"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    for processor in processors.read().await.iter() {
        processor.close().await;
    }
    consumer.unsubscribe();
    info!(consumer_id = %consumer_id, "extractor poll loop exited");
}

/// Authentication failures and a fully unreachable broker set are
/// unrecoverable by the client's own retry policy; everything else is the
/// kind of transient blip `rdkafka` is expected to absorb on its own.
fn is_fatal(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(RDKafkaErrorCode::Authentication)
            | Some(RDKafkaErrorCode::AllBrokersDown)
            | Some(RDKafkaErrorCode::Fatal)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_fatal_error_is_not_fatal() {
        let err = KafkaError::MessageConsumption(RDKafkaErrorCode::OperationTimedOut);
        assert!(!is_fatal(&err));
    }
}

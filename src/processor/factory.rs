//! Processor Factory — the sole construction site for Processors.
//!
//! New types register once, at startup (see [`ProcessorFactory::default`]);
//! the table is otherwise closed to modification, matching the
//! "closed to modification, open to extension" rule from the design notes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::{database_sync::DatabaseSyncProcessor, file_sink::FileSinkProcessor};
use super::{streaming_forwarder::StreamingForwarderProcessor, Processor};

/// Errors the factory can report; both map to 400 at the HTTP layer.
#[derive(Debug, Error, Clone)]
pub enum FactoryError {
    /// `type` tag has no registered constructor.
    #[error("unknown processor type: {0}")]
    UnknownType(String),
    /// `config` failed validation for the matched type.
    #[error("bad processor config: {0}")]
    BadConfig(String),
}

type Constructor =
    Box<dyn Fn(&HashMap<String, Value>) -> Result<Arc<dyn Processor>, FactoryError> + Send + Sync>;

/// Registration table keyed by the `type` tag on `ProcessorConfig`.
pub struct ProcessorFactory {
    constructors: HashMap<String, Constructor>,
}

impl ProcessorFactory {
    /// An empty factory with no registered types.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register a constructor under `type_tag`. Intended to be called only
    /// during process startup, before the factory is handed to the
    /// Supervisor.
    pub fn register<F>(&mut self, type_tag: impl Into<String>, ctor: F)
    where
        F: Fn(&HashMap<String, Value>) -> Result<Arc<dyn Processor>, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(type_tag.into(), Box::new(ctor));
    }

    /// Build a Processor from its declarative type and config. Unknown
    /// types and config validation failures both fail atomically — no
    /// partial construction, no side effects for a rejected type.
    pub fn build(
        &self,
        processor_type: &str,
        config: &HashMap<String, Value>,
    ) -> Result<Arc<dyn Processor>, FactoryError> {
        let ctor = self
            .constructors
            .get(processor_type)
            .ok_or_else(|| FactoryError::UnknownType(processor_type.to_string()))?;
        ctor(config)
    }
}

impl Default for ProcessorFactory {
    /// The built-in registration: `file_sink`, `database_sync`,
    /// `streaming_forwarder`.
    fn default() -> Self {
        let mut factory = Self::empty();

        factory.register("file_sink", |config| {
            FileSinkProcessor::from_config(config)
                .map(|p| Arc::new(p) as Arc<dyn Processor>)
        });

        factory.register("database_sync", |config| {
            DatabaseSyncProcessor::from_config(config)
                .map(|p| Arc::new(p) as Arc<dyn Processor>)
        });

        factory.register("streaming_forwarder", |config| {
            StreamingForwarderProcessor::from_config(config)
                .map(|p| Arc::new(p) as Arc<dyn Processor>)
        });

        factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_rejected() {
        let factory = ProcessorFactory::default();
        let err = factory.build("nonexistent", &HashMap::new()).unwrap_err();
        assert!(matches!(err, FactoryError::UnknownType(_)));
    }

    #[test]
    fn file_sink_builds_with_valid_config() {
        let factory = ProcessorFactory::default();
        let mut config = HashMap::new();
        config.insert(
            "file_path".to_string(),
            Value::String("/tmp/factory-test.log".to_string()),
        );
        assert!(factory.build("file_sink", &config).is_ok());
    }

    #[test]
    fn file_sink_rejects_missing_path() {
        let factory = ProcessorFactory::default();
        let err = factory.build("file_sink", &HashMap::new()).unwrap_err();
        assert!(matches!(err, FactoryError::BadConfig(_)));
    }

    #[test]
    fn custom_registration_is_honored() {
        let mut factory = ProcessorFactory::empty();
        factory.register("noop", |_config| {
            Err(FactoryError::BadConfig("not implemented in this test".to_string()))
        });
        assert!(matches!(
            factory.build("noop", &HashMap::new()),
            Err(FactoryError::BadConfig(_))
        ));
        assert!(matches!(
            factory.build("file_sink", &HashMap::new()),
            Err(FactoryError::UnknownType(_))
        ));
    }
}

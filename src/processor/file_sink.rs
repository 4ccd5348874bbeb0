//! `file_sink` — appends one line per record to a local file.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use super::factory::FactoryError;
use super::{Processor, ProcessorError, Record};

/// Appends each record's value, newline-terminated, to `file_path`.
/// Flushes after every write; the file handle is reopened per process()
/// call so a deleted/rotated file is re-created transparently. `process`
/// calls are never concurrent — the Extractor's poll loop dispatches one
/// record at a time — so no internal locking is needed.
pub struct FileSinkProcessor {
    path: PathBuf,
}

impl FileSinkProcessor {
    /// Parse `config.file_path` and ensure the parent directory exists.
    pub fn from_config(config: &HashMap<String, Value>) -> Result<Self, FactoryError> {
        let file_path = config
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FactoryError::BadConfig("file_sink requires a string `file_path`".to_string())
            })?;

        let path = PathBuf::from(file_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FactoryError::BadConfig(format!(
                        "could not create parent directory for {file_path}: {e}"
                    ))
                })?;
            }
        }

        Ok(Self { path })
    }
}

#[async_trait]
impl Processor for FileSinkProcessor {
    async fn process(&self, record: &Record) -> Result<(), ProcessorError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ProcessorError::Permanent(format!("{}: {e}", self.path.display())))?;

        file.write_all(&record.value)
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.flush())
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ProcessorError::Permanent(e.to_string())
                }
                _ => ProcessorError::Transient(e.to_string()),
            })
    }

    async fn close(&self) {
        // Nothing held open across calls; each process() opens and
        // flushes its own handle.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(value: &[u8]) -> Record {
        Record {
            topic: "t".to_string(),
            partition: 0,
            offset: 0,
            key: None,
            value: value.to_vec(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");

        let mut config = HashMap::new();
        config.insert(
            "file_path".to_string(),
            Value::String(path.to_string_lossy().to_string()),
        );
        let processor = FileSinkProcessor::from_config(&config).unwrap();

        processor.process(&record(b"first")).await.unwrap();
        processor.process(&record(b"second")).await.unwrap();
        processor.close().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[tokio::test]
    async fn creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.log");

        let mut config = HashMap::new();
        config.insert(
            "file_path".to_string(),
            Value::String(path.to_string_lossy().to_string()),
        );
        let processor = FileSinkProcessor::from_config(&config).unwrap();
        processor.process(&record(b"hello")).await.unwrap();

        assert!(path.exists());
    }

    #[test]
    fn missing_file_path_is_bad_config() {
        let err = FileSinkProcessor::from_config(&HashMap::new()).unwrap_err();
        assert!(matches!(err, FactoryError::BadConfig(_)));
    }
}

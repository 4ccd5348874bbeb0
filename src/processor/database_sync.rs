//! `database_sync` — inserts one row per record into a Postgres table.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::factory::FactoryError;
use super::{Processor, ProcessorError, Record};

const DEFAULT_TABLE: &str = "consumed_records";

/// Writes `(topic, partition, offset, key, value, ts)` rows via a lazily
/// connected `PgPool`. Construction never blocks on the network —
/// `connect_lazy` defers the first real connection to the first query,
/// which keeps [`super::factory::ProcessorFactory::build`] synchronous.
pub struct DatabaseSyncProcessor {
    pool: PgPool,
    table: String,
}

impl DatabaseSyncProcessor {
    /// Parse `config.db_dsn` (required) and `config.table` (optional,
    /// defaults to `consumed_records`).
    pub fn from_config(config: &HashMap<String, Value>) -> Result<Self, FactoryError> {
        let dsn = config
            .get("db_dsn")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FactoryError::BadConfig("database_sync requires a string `db_dsn`".to_string())
            })?;

        let table = config
            .get("table")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TABLE)
            .to_string();
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FactoryError::BadConfig(format!(
                "database_sync `table` must be alphanumeric/underscore, got {table:?}"
            )));
        }

        let pool = PgPoolOptions::new()
            .max_connections(num_cpus::get() as u32)
            .connect_lazy(dsn)
            .map_err(|e| FactoryError::BadConfig(format!("invalid db_dsn: {e}")))?;

        Ok(Self { pool, table })
    }
}

#[async_trait]
impl Processor for DatabaseSyncProcessor {
    async fn process(&self, record: &Record) -> Result<(), ProcessorError> {
        let query = format!(
            "INSERT INTO {} (topic, partition, record_offset, record_key, record_value, record_timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            self.table
        );

        sqlx::query(&query)
            .bind(&record.topic)
            .bind(record.partition)
            .bind(record.offset)
            .bind(record.key.as_deref())
            .bind(record.value.as_slice())
            .bind(record.timestamp)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connection-shaped failures are worth retrying; anything that looks
/// like a schema or constraint problem is not.
fn classify(err: sqlx::Error) -> ProcessorError {
    match &err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            ProcessorError::Transient(err.to_string())
        }
        sqlx::Error::Database(db_err) => {
            // Connection-exception and similar SQLSTATE classes (08xxx) are
            // transient; everything else (constraint violations, undefined
            // column/table) is a config problem.
            match db_err.code().as_deref() {
                Some(code) if code.starts_with("08") => ProcessorError::Transient(err.to_string()),
                _ => ProcessorError::Permanent(err.to_string()),
            }
        }
        _ => ProcessorError::Permanent(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn missing_dsn_is_bad_config() {
        let err = DatabaseSyncProcessor::from_config(&HashMap::new()).unwrap_err();
        assert!(matches!(err, FactoryError::BadConfig(_)));
    }

    #[test]
    fn rejects_non_alphanumeric_table_name() {
        let config = config_with(&[
            ("db_dsn", "postgres://localhost/test"),
            ("table", "records; drop table users"),
        ]);
        let err = DatabaseSyncProcessor::from_config(&config).unwrap_err();
        assert!(matches!(err, FactoryError::BadConfig(_)));
    }

    #[test]
    fn accepts_valid_dsn_without_connecting() {
        let config = config_with(&[("db_dsn", "postgres://localhost/test")]);
        let processor = DatabaseSyncProcessor::from_config(&config).unwrap();
        assert_eq!(processor.table, DEFAULT_TABLE);
    }

    #[test]
    fn honors_custom_table_name() {
        let config = config_with(&[
            ("db_dsn", "postgres://localhost/test"),
            ("table", "my_events"),
        ]);
        let processor = DatabaseSyncProcessor::from_config(&config).unwrap();
        assert_eq!(processor.table, "my_events");
    }
}

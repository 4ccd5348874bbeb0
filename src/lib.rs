//! Kafka Consumer Control Plane.
//!
//! A declarative control plane for Kafka consumers: operators submit
//! [`model::ConsumerSpec`]s over HTTP, and the [`supervisor::ConsumerSupervisor`]
//! owns the lifecycle of the running [`extractor::Extractor`] for each one,
//! fanning records out to pluggable [`processor::Processor`] sinks. The
//! [`inspector::OffsetLagInspector`] gives read-only visibility into offsets
//! and consumer lag without touching any running consumer.
//!
//! ```no_run
//! use consumer_supervisor::config::AppConfig;
//! use consumer_supervisor::http;
//! use consumer_supervisor::inspector::OffsetLagInspector;
//! use consumer_supervisor::processor::factory::ProcessorFactory;
//! use consumer_supervisor::store::memory::InMemorySpecStore;
//! use consumer_supervisor::supervisor::ConsumerSupervisor;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::from_env()?;
//! let store = Arc::new(InMemorySpecStore::new());
//! let supervisor = Arc::new(ConsumerSupervisor::new(
//!     store.clone(),
//!     Arc::new(ProcessorFactory::default()),
//!     config.clone(),
//! ));
//! let inspector = Arc::new(OffsetLagInspector::new(
//!     store,
//!     config.kafka_bootstrap_servers.clone(),
//!     config.inspector_timeout,
//! ));
//!
//! let app = http::router(http::AppState::new(supervisor, inspector));
//! let listener = tokio::net::TcpListener::bind(config.http_bind_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Process-wide configuration, loaded once from the environment.
pub mod config;

/// Crate-wide error taxonomy and its `IntoResponse` mapping.
pub mod error;

/// Message Extractor: one running consumer's Kafka client and poll loop.
pub mod extractor;

/// HTTP surface: routes, handlers, and wire DTOs.
pub mod http;

/// Offset/Lag Inspector: read-only consumer group visibility.
pub mod inspector;

/// The persisted `ConsumerSpec`/`ProcessorConfig` data model.
pub mod model;

/// Processor Pipeline and the Processor Factory.
pub mod processor;

/// Specification Store: the durable record of consumer specs.
pub mod store;

/// Consumer Supervisor: the in-process registry and lifecycle engine.
pub mod supervisor;

/// Crate version, as set by Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the global tracing subscriber from `config.log_level` and
/// `config.log_format`. Call once, before anything else logs.
pub fn init_tracing(config: &config::AppConfig) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        config::LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        config::LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

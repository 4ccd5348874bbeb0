//! Control-plane entry point: load configuration, wire up the Store,
//! Supervisor, and Inspector, and serve the HTTP surface until shutdown.

use std::sync::Arc;

use clap::Parser;
use consumer_supervisor::config::AppConfig;
use consumer_supervisor::http::{self, AppState};
use consumer_supervisor::inspector::OffsetLagInspector;
use consumer_supervisor::processor::factory::ProcessorFactory;
use consumer_supervisor::store::memory::InMemorySpecStore;
use consumer_supervisor::supervisor::ConsumerSupervisor;
use tracing::{error, info};

/// Local overrides for env-var-driven configuration, used for quick
/// manual runs; production deployments are expected to set the
/// environment variables directly.
#[derive(Parser, Debug)]
#[command(name = "consumer-supervisor", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Override `HTTP_BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(bind) = &cli.bind {
        std::env::set_var("HTTP_BIND_ADDR", bind);
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("startup failed: invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    consumer_supervisor::init_tracing(&config);
    info!(version = consumer_supervisor::VERSION, "starting consumer supervisor");

    let store = Arc::new(InMemorySpecStore::new());
    let factory = Arc::new(ProcessorFactory::default());
    let supervisor = Arc::new(ConsumerSupervisor::new(store.clone(), factory, config.clone()));
    let inspector = Arc::new(OffsetLagInspector::new(
        store,
        config.kafka_bootstrap_servers.clone(),
        config.inspector_timeout,
    ));

    let app = http::router(AppState::new(supervisor.clone(), inspector));

    let listener = tokio::net::TcpListener::bind(config.http_bind_addr).await?;
    info!(addr = %config.http_bind_addr, "listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("shutting down, stopping all extractors");
    supervisor.shutdown().await;

    if let Err(err) = serve_result {
        error!(error = %err, "server error");
        return Err(err.into());
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, beginning graceful shutdown"),
        Err(err) => error!(error = %err, "failed to install ctrl-c handler"),
    }
}

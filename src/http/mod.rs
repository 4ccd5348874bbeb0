//! HTTP surface. The control plane's only transport: every Supervisor and
//! Inspector operation is reachable through exactly one route here.

pub mod dto;
pub mod handlers;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::inspector::OffsetLagInspector;
use crate::supervisor::ConsumerSupervisor;

/// Shared state handed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub(crate) supervisor: Arc<ConsumerSupervisor>,
    pub(crate) inspector: Arc<OffsetLagInspector>,
    /// Flips to `true` once startup (Store + Inspector bootstrap) has
    /// succeeded; read by `/readyz`.
    pub(crate) ready: Arc<AtomicBool>,
}

impl AppState {
    /// Build application state around an already-constructed Supervisor
    /// and Inspector, marked ready immediately.
    pub fn new(supervisor: Arc<ConsumerSupervisor>, inspector: Arc<OffsetLagInspector>) -> Self {
        Self {
            supervisor,
            inspector,
            ready: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Build the full router: consumer CRUD/lifecycle, group/lag inspection,
/// and the two liveness/readiness probes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/consumers/",
            get(handlers::list_consumers).post(handlers::create_consumer),
        )
        .route(
            "/consumers/{id}",
            get(handlers::get_consumer)
                .put(handlers::update_consumer)
                .delete(handlers::delete_consumer),
        )
        .route("/consumers/{id}/start", post(handlers::start_consumer))
        .route("/consumers/{id}/stop", post(handlers::stop_consumer))
        .route("/consumergroups/", get(handlers::list_consumer_groups))
        .route(
            "/consumergroups/{group_id}/offsets",
            get(handlers::group_offsets),
        )
        .route(
            "/monitor/consumer-group-offsets",
            get(handlers::monitor_offsets),
        )
        .route("/monitor/consumer-group-lag", get(handlers::monitor_lag))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .with_state(state)
}

//! Aggregator callback server with observability for the spin sagas.
//!
//! Translates aggregator wallet callbacks into saga runs, serves round
//! lookups and session launch, with structured logging (tracing) and
//! Prometheus metrics.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod routes;
pub mod sessions;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ledger::{RoundRepository, SpinRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    Collaborators, InMemoryGameCatalog, InMemoryPlayerLimitService, InMemoryWalletService,
    SagaConfig, SpinCoordinator, TracingEventPublisher,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aggregator::AdapterRegistry;
use sessions::SessionStore;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: SpinCoordinator,
    pub sessions: SessionStore,
    pub registry: AdapterRegistry,
    pub games: InMemoryGameCatalog,
    pub wallet: InMemoryWalletService,
    pub limits: InMemoryPlayerLimitService,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/callbacks/{aggregator}", get(routes::callbacks::handle))
        .route("/rounds/{id}", get(routes::rounds::get))
        .route("/sessions", post(routes::sessions::open))
        .route("/freespins", post(routes::freespins::grant))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a ledger with in-memory services.
///
/// The game catalog is filled from every registered aggregator; a failed
/// sync is logged and leaves that aggregator's games out.
pub async fn create_default_state<L>(
    ledger: L,
    registry: AdapterRegistry,
    saga_config: SagaConfig,
) -> Arc<AppState>
where
    L: RoundRepository + SpinRepository + 'static,
{
    let games = InMemoryGameCatalog::new();
    let wallet = InMemoryWalletService::new();
    let limits = InMemoryPlayerLimitService::new();

    for tag in registry.tags() {
        let synced = match registry.adapters(tag) {
            Ok(adapters) => adapters.games.fetch_games().await,
            Err(e) => Err(e),
        };
        match synced {
            Ok(list) => {
                let count = games.upsert_all(list);
                tracing::info!(aggregator = %tag, count, "game catalog synced");
            }
            Err(e) => tracing::warn!(aggregator = %tag, error = %e, "game catalog sync failed"),
        }
    }

    let collaborators = Collaborators::with_ledger(
        ledger,
        Arc::new(wallet.clone()),
        Arc::new(limits.clone()),
        Arc::new(games.clone()),
        Arc::new(TracingEventPublisher),
    );

    Arc::new(AppState {
        coordinator: SpinCoordinator::new(collaborators, saga_config),
        sessions: SessionStore::new(),
        registry,
        games,
        wallet,
        limits,
    })
}

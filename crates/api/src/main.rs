//! API server entry point.

use api::aggregator::onegamehub::{self, OneGameHubConfig};
use api::aggregator::{AdapterRegistry, AggregatorTag};
use api::config::Config;
use ledger::{InMemoryLedger, PostgresLedger};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Register aggregators
    let mut adapters = AdapterRegistry::new();
    adapters.register(
        AggregatorTag::OneGameHub,
        onegamehub::factory(OneGameHubConfig {
            launch_url: config.onegamehub_launch_url.clone(),
            operator_id: config.onegamehub_operator_id.clone(),
            ..OneGameHubConfig::default()
        }),
    );

    // 4. Create the ledger and application state
    let state = match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let ledger = PostgresLedger::new(pool);
            ledger
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL ledger");
            api::create_default_state(ledger, adapters, config.saga_config()).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory ledger");
            api::create_default_state(InMemoryLedger::new(), adapters, config.saga_config()).await
        }
    };

    // 5. Build the application
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

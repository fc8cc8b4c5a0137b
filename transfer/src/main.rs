//! Transfer service binary.
//!
//! Wires the event store, event bus, command router, saga engine, and
//! HTTP surface together from environment configuration.
//!
//! Run with: cargo run --bin moneyrail-transfer
//! API: http://localhost:8080/transfers
//! Health: http://localhost:8080/healthz
//! Metrics: http://localhost:9090/metrics

use moneyrail_core::environment::SystemClock;
use moneyrail_core::event_store::InMemoryEventStore;
use moneyrail_redpanda::RedpandaEventBus;
use moneyrail_runtime::MetricsServer;
use moneyrail_transfer::config::Config;
use moneyrail_transfer::idempotency::IdempotencyStore;
use moneyrail_transfer::router::CommandRouter;
use moneyrail_transfer::saga::{
    BOOK_JOB_TYPE, BookWorker, DEBIT_JOB_TYPE, DebitWorker, InProcessEngine,
};
use moneyrail_transfer::server::{AppState, app};
use opentelemetry::trace::TracerProvider as _;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env();
    info!(addr = %config.server.bind_addr(), "Starting transfer service");

    // Metrics recorder plus a scrape endpoint on its own port.
    let mut metrics = MetricsServer::new(config.server.metrics_addr().parse()?);
    metrics.start()?;
    let metrics_server = Arc::new(metrics);

    let metrics_app = axum::Router::new().route(
        "/metrics",
        axum::routing::get({
            let metrics_server = Arc::clone(&metrics_server);
            move || {
                let metrics_server = Arc::clone(&metrics_server);
                async move { metrics_server.render().unwrap_or_default() }
            }
        }),
    );
    let metrics_listener =
        tokio::net::TcpListener::bind(config.server.metrics_addr()).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, metrics_app).await {
            error!(error = %err, "Metrics server error");
        }
    });

    // The store is the source of truth; the bus carries committed
    // events to downstream consumers.
    let event_store = Arc::new(InMemoryEventStore::new());
    let event_bus = Arc::new(
        RedpandaEventBus::builder()
            .brokers(config.redpanda.brokers.clone())
            .producer_acks(config.redpanda.acks.clone())
            .compression(config.redpanda.compression.clone())
            .timeout(std::time::Duration::from_millis(config.redpanda.timeout_ms))
            .build()?,
    );
    let clock = Arc::new(SystemClock);

    let router = Arc::new(
        CommandRouter::new(event_store, event_bus, clock.clone())
            .with_retry_policy(config.runtime.retry_policy())
            .with_dedup_window(config.runtime.dedup_window()),
    );

    let engine = Arc::new(
        InProcessEngine::builder()
            .register(DEBIT_JOB_TYPE, Arc::new(DebitWorker::new(Arc::clone(&router))))
            .register(BOOK_JOB_TYPE, Arc::new(BookWorker::new(Arc::clone(&router))))
            .process(
                config.saga.process_id.clone(),
                [DEBIT_JOB_TYPE, BOOK_JOB_TYPE],
            )
            .step_attempts(config.saga.step_attempts)
            .build()?,
    );

    let idempotency = Arc::new(IdempotencyStore::new(config.idempotency.ttl(), clock));

    let state = AppState {
        router,
        engine,
        idempotency,
        process_id: config.saga.process_id.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr()).await?;
    info!(addr = %config.server.bind_addr(), "Transfer service listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Transfer service stopped");
    Ok(())
}

fn init_tracing() {
    // A provider with no exporter still mints real trace and span ids,
    // which is what traceparent propagation needs. Point an exporter
    // at it to ship spans somewhere.
    let provider = opentelemetry_sdk::trace::TracerProvider::builder().build();
    let tracer = provider.tracer("moneyrail-transfer");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moneyrail=info,moneyrail_transfer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}

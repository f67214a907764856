//! tg-relay binary entrypoint.
//!
//! Wires the queue consumer, the dispatch pool and the health server, then
//! waits for SIGINT/SIGTERM and shuts the pipeline down front to back.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use relay_api::server::HealthServer;
use relay_api::state::AppState;
use relay_common::config::{AppConfig, Environment};
use relay_common::propagation::Propagator;
use relay_consumer::amqp::AmqpConsumer;
use relay_consumer::ingest::Ingestor;
use relay_decoders::MessageDecoder;
use relay_engine::outcome::LoggingOutcomeSink;
use relay_engine::pool::{DispatchPool, Dispatcher};
use relay_notifier::TelegramClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    init_tracing(config.env);

    tracing::info!(
        env = %config.env,
        queue = %config.amqp.queue,
        encoding = %config.payload_encoding,
        workers = config.worker_count,
        "tg-relay starting..."
    );

    let propagator = Propagator::w3c();

    // Subscription failures are fatal
    let consumer = Arc::new(
        AmqpConsumer::connect(&config.amqp)
            .await
            .context("Failed to connect to RabbitMQ")?,
    );

    // Dispatch pool
    let client = Arc::new(TelegramClient::new(&config.telegram, propagator.clone())?);
    let outcomes = Arc::new(LoggingOutcomeSink::new());
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let mut pool = DispatchPool::new(rx, Dispatcher::new(client, outcomes.clone()));
    pool.start_processing(config.worker_count);

    // Health probe
    let health = HealthServer::start(config.health_addr, AppState::new(consumer.clone()))
        .await
        .context("Failed to start health server")?;

    // Ingestion
    let cancel = CancellationToken::new();
    let ingestor = Ingestor::new(MessageDecoder::new(config.payload_encoding), propagator);
    let ingest = consumer
        .start(ingestor, tx, cancel.clone())
        .await
        .context("Failed to subscribe to queue")?;

    shutdown_signal().await?;

    // 1. Stop ingestion. This drops the last sender and closes the channel.
    cancel.cancel();
    match ingest.await {
        Ok(stats) => tracing::info!(
            received = stats.received,
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            requeued = stats.requeued,
            ack_failures = stats.ack_failures,
            "Ingestion stopped"
        ),
        Err(e) => tracing::error!(error = %e, "Ingestion task failed"),
    }
    consumer.close().await;

    // 2. Let the workers drain what is buffered
    let report = pool.stop_processing(config.shutdown_grace()).await;
    let delivery = outcomes.stats();
    tracing::info!(
        processed = report.processed,
        abandoned_in_flight = report.abandoned_in_flight,
        abandoned_buffered = report.abandoned_buffered,
        timed_out = report.timed_out,
        delivered = delivery.delivered,
        failed = delivery.failed,
        skipped = delivery.skipped,
        "Dispatch stopped"
    );

    // 3. Health probe last
    health.stop(config.health_grace()).await;

    tracing::info!("tg-relay stopped.");
    Ok(())
}

/// Install the global subscriber for the deployment environment.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing(env: Environment) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(env)));

    match env {
        Environment::Local => tracing_subscriber::fmt().with_env_filter(filter).init(),
        Environment::Dev | Environment::Prod => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init()
        }
    }
}

fn default_filter(env: Environment) -> String {
    let level = match env {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    };
    [
        "tg_relay",
        "relay_consumer",
        "relay_engine",
        "relay_notifier",
        "relay_api",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .chain(std::iter::once("tower_http=info".to_string()))
    .collect::<Vec<_>>()
    .join(",")
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received, stopping gracefully...");
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for SIGINT")?;
                tracing::info!("SIGINT received, stopping gracefully...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        tracing::info!("Ctrl-C received, stopping gracefully...");
    }
    Ok(())
}

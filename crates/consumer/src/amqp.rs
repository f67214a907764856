//! RabbitMQ binding of the queue consumer.
//!
//! Declares a durable, non-exclusive, non-auto-delete queue, subscribes with
//! manual acknowledgement and a bounded prefetch, and adapts `lapin`
//! deliveries into [`RawEnvelope`]s for the [`Ingestor`].

use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;
use tokio_util::sync::CancellationToken;

use relay_common::config::AmqpConfig;
use relay_common::error::AppError;
use relay_common::health::QueueProbe;
use relay_common::types::{HeaderValue, Headers, QueueStatus, TracedMessage};

use crate::ingest::{Acknowledger, IngestStats, Ingestor, RawEnvelope};

const CONSUMER_TAG: &str = "tg-relay";

/// Owns the broker connection and the consuming channel of one queue.
pub struct AmqpConsumer {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpConsumer {
    /// Connect to the broker, declare the queue and set the prefetch.
    ///
    /// Any failure here is fatal for the process.
    pub async fn connect(config: &AmqpConfig) -> Result<Self, AppError> {
        tracing::info!(queue = %config.queue, "Connecting to RabbitMQ");

        let connection = Connection::connect(&config.uri(), ConnectionProperties::default())
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        channel
            .queue_declare(&config.queue, durable_queue(false), FieldTable::default())
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;

        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;

        tracing::info!(
            queue = %config.queue,
            prefetch = config.prefetch,
            "Connected to RabbitMQ"
        );

        Ok(Self {
            connection,
            channel,
            queue: config.queue.clone(),
        })
    }

    /// Subscribe to the queue and run the ingestion loop in a background task.
    ///
    /// Returns an error when the subscription cannot be created.
    pub async fn start(
        &self,
        ingestor: Ingestor,
        sink: mpsc::Sender<TracedMessage>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<IngestStats>, AppError> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: false,
                    exclusive: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;

        tracing::info!(queue = %self.queue, "Subscribed to queue");

        let deliveries = consumer.map(|delivery| {
            delivery
                .map(|delivery| RawEnvelope {
                    headers: headers_from_properties(&delivery.properties),
                    payload: delivery.data,
                    acker: Box::new(LapinAcker(delivery.acker)),
                })
                .map_err(|e| AppError::Transport(e.to_string()))
        });

        Ok(tokio::spawn(async move {
            ingestor.run(deliveries, sink, cancel).await
        }))
    }

    /// Close the consuming channel and the connection. Call once.
    ///
    /// Ends the delivery stream, which stops the ingestion loop.
    pub async fn close(&self) {
        tracing::info!(queue = %self.queue, "Closing consumer");
        if let Err(e) = self.channel.close(200, "shutdown").await {
            tracing::warn!(error = %e, "Failed to close AMQP channel");
        }
        if let Err(e) = self.connection.close(200, "shutdown").await {
            tracing::warn!(error = %e, "Failed to close AMQP connection");
        }
    }
}

#[async_trait]
impl QueueProbe for AmqpConsumer {
    /// Passive declare on a short-lived channel.
    ///
    /// A failed passive declare closes the channel it ran on, so it never
    /// runs on the consuming channel.
    async fn is_queue_ok(&self) -> Result<QueueStatus, AppError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let result = channel
            .queue_declare(&self.queue, durable_queue(true), FieldTable::default())
            .await;

        match result {
            Ok(_) => {
                if let Err(e) = channel.close(200, "health check").await {
                    tracing::debug!(error = %e, "Failed to close health check channel");
                }
                Ok(QueueStatus::Up)
            }
            Err(e) => Err(AppError::Queue(e.to_string())),
        }
    }
}

fn durable_queue(passive: bool) -> QueueDeclareOptions {
    QueueDeclareOptions {
        passive,
        durable: true,
        exclusive: false,
        auto_delete: false,
        nowait: false,
    }
}

struct LapinAcker(Acker);

#[async_trait]
impl Acknowledger for LapinAcker {
    async fn ack(&self) -> Result<(), AppError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| AppError::Queue(e.to_string()))
    }

    async fn reject(&self) -> Result<(), AppError> {
        self.0
            .nack(BasicNackOptions {
                multiple: false,
                requeue: true,
            })
            .await
            .map_err(|e| AppError::Queue(e.to_string()))
    }
}

/// Convert AMQP message headers into transport-neutral headers.
pub fn headers_from_properties(properties: &BasicProperties) -> Headers {
    properties
        .headers()
        .as_ref()
        .map(|table| {
            table
                .inner()
                .iter()
                .map(|(key, value)| (key.as_str().to_string(), header_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

fn header_value(value: &AMQPValue) -> HeaderValue {
    match value {
        AMQPValue::LongString(s) => {
            HeaderValue::Text(String::from_utf8_lossy(s.as_bytes()).into_owned())
        }
        AMQPValue::ShortString(s) => HeaderValue::Text(s.as_str().to_string()),
        AMQPValue::Boolean(b) => HeaderValue::Boolean(*b),
        AMQPValue::ShortShortInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::ShortShortUInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::ShortInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::ShortUInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::LongInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::LongUInt(n) => HeaderValue::Integer(i64::from(*n)),
        AMQPValue::LongLongInt(n) => HeaderValue::Integer(*n),
        _ => HeaderValue::Other,
    }
}

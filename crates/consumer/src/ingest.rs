//! Transport-agnostic ingestion loop.
//!
//! For every delivered envelope:
//! 1. Extract the trace context and correlation id from the headers
//! 2. Decode the body (undecodable bodies are acked and dropped)
//! 3. Hand the `TracedMessage` to the dispatch channel (blocks when full)
//! 4. Ack the envelope once the hand-off completed
//!
//! The loop ends when the delivery stream closes, fails, or the
//! cancellation token fires.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt as _};
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use relay_common::error::AppError;
use relay_common::propagation::Propagator;
use relay_common::types::{CorrelationId, Headers, TracedMessage};
use relay_decoders::MessageDecoder;

/// Settles one delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Mark the delivery as processed.
    async fn ack(&self) -> Result<(), AppError>;

    /// Return the delivery to the queue for redelivery.
    async fn reject(&self) -> Result<(), AppError>;
}

/// One transport-level delivery.
pub struct RawEnvelope {
    pub payload: Vec<u8>,
    pub headers: Headers,
    pub acker: Box<dyn Acknowledger>,
}

/// Counters reported when the ingestion loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub forwarded: u64,
    /// Undecodable envelopes that were acked and dropped
    pub dropped: u64,
    /// Envelopes handed back to the broker at shutdown
    pub requeued: u64,
    pub ack_failures: u64,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Decodes envelopes and forwards them to the dispatch channel.
pub struct Ingestor {
    decoder: MessageDecoder,
    propagator: Propagator,
}

impl Ingestor {
    pub fn new(decoder: MessageDecoder, propagator: Propagator) -> Self {
        Self {
            decoder,
            propagator,
        }
    }

    /// Drain `deliveries` into `sink` until the stream ends or `cancel` fires.
    pub async fn run<S>(
        &self,
        mut deliveries: S,
        sink: mpsc::Sender<TracedMessage>,
        cancel: CancellationToken,
    ) -> IngestStats
    where
        S: Stream<Item = Result<RawEnvelope, AppError>> + Unpin,
    {
        let mut stats = IngestStats::default();
        tracing::info!(encoding = %self.decoder.encoding(), "Ingestion started");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Ingestion cancelled");
                    break;
                }
                next = deliveries.next() => next,
            };

            let envelope = match next {
                Some(Ok(envelope)) => envelope,
                Some(Err(e)) => {
                    // No reconnect: ingestion stays stopped until restart.
                    tracing::error!(error = %e, "Delivery stream failed, ingestion stopped");
                    break;
                }
                None => {
                    tracing::info!("Delivery stream closed");
                    break;
                }
            };

            stats.received += 1;
            let correlation_id = CorrelationId::from_headers(&envelope.headers);
            let span = tracing::info_span!("ingest", correlation_id = %correlation_id);

            let flow = self
                .handle(envelope, correlation_id, &sink, &cancel, &mut stats)
                .instrument(span)
                .await;
            if flow == Flow::Stop {
                break;
            }
        }

        tracing::info!(
            received = stats.received,
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            requeued = stats.requeued,
            "Ingestion stopped"
        );
        stats
    }

    async fn handle(
        &self,
        envelope: RawEnvelope,
        correlation_id: CorrelationId,
        sink: &mpsc::Sender<TracedMessage>,
        cancel: &CancellationToken,
        stats: &mut IngestStats,
    ) -> Flow {
        let RawEnvelope {
            payload,
            headers,
            acker,
        } = envelope;

        let trace = self.propagator.extract(&headers);

        let message = match self.decoder.decode(&payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bytes = payload.len(),
                    "Failed to decode message, dropping"
                );
                stats.dropped += 1;
                settle_ack(acker.as_ref(), stats).await;
                return Flow::Continue;
            }
        };

        let trace_id = trace.trace_id();
        tracing::debug!(
            kind = %message.kind,
            user_id = message.user_id,
            trace_id = trace_id.as_deref().unwrap_or("-"),
            "Forwarding message"
        );

        let traced = TracedMessage {
            message,
            correlation_id,
            trace,
        };

        tokio::select! {
            biased;
            sent = sink.send(traced) => match sent {
                Ok(()) => {
                    stats.forwarded += 1;
                    settle_ack(acker.as_ref(), stats).await;
                    Flow::Continue
                }
                Err(_) => {
                    tracing::warn!("Dispatch channel closed, returning delivery to the queue");
                    settle_reject(acker.as_ref(), stats).await;
                    Flow::Stop
                }
            },
            _ = cancel.cancelled() => {
                tracing::info!("Cancelled while waiting for channel capacity, returning delivery to the queue");
                settle_reject(acker.as_ref(), stats).await;
                Flow::Stop
            }
        }
    }
}

async fn settle_ack(acker: &dyn Acknowledger, stats: &mut IngestStats) {
    if let Err(e) = acker.ack().await {
        stats.ack_failures += 1;
        tracing::error!(error = %e, "Failed to ack delivery");
    }
}

async fn settle_reject(acker: &dyn Acknowledger, stats: &mut IngestStats) {
    stats.requeued += 1;
    if let Err(e) = acker.reject().await {
        stats.ack_failures += 1;
        tracing::error!(error = %e, "Failed to reject delivery");
    }
}

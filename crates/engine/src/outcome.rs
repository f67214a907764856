//! Delivery outcome reporting.
//!
//! Delivery is fire-and-forget: nothing is retried or re-queued. Outcomes are
//! still handed to an [`OutcomeSink`] so failures stay visible.

use std::sync::atomic::{AtomicU64, Ordering};

use relay_common::types::{CorrelationId, MessageKind};

/// Result of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The remote API accepted the request
    Delivered,
    /// The remote API rejected the request or could not be reached
    Failed,
    /// The message kind has no delivery method
    Skipped,
}

impl DeliveryOutcome {
    pub fn from_sent(sent: bool) -> Self {
        if sent {
            DeliveryOutcome::Delivered
        } else {
            DeliveryOutcome::Failed
        }
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::Failed => write!(f, "failed"),
            DeliveryOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// What a worker reports after processing one message.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRecord<'a> {
    pub worker_id: usize,
    pub correlation_id: &'a CorrelationId,
    pub kind: MessageKind,
    pub recipient: u64,
    pub outcome: DeliveryOutcome,
}

/// Receives every delivery outcome. Called concurrently from all workers.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, record: &DeliveryRecord<'_>);
}

/// Snapshot of the outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl DeliveryStats {
    pub fn total(&self) -> u64 {
        self.delivered + self.failed + self.skipped
    }
}

/// Logs each outcome and counts them.
#[derive(Debug, Default)]
pub struct LoggingOutcomeSink {
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl LoggingOutcomeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

impl OutcomeSink for LoggingOutcomeSink {
    fn record(&self, record: &DeliveryRecord<'_>) {
        match record.outcome {
            DeliveryOutcome::Delivered => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    worker = record.worker_id,
                    correlation_id = %record.correlation_id,
                    kind = %record.kind,
                    recipient = record.recipient,
                    "Message delivered"
                );
            }
            DeliveryOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    worker = record.worker_id,
                    correlation_id = %record.correlation_id,
                    kind = %record.kind,
                    recipient = record.recipient,
                    "Message delivery failed, not retrying"
                );
            }
            DeliveryOutcome::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    worker = record.worker_id,
                    correlation_id = %record.correlation_id,
                    kind = %record.kind,
                    "Unsupported message kind, skipped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(correlation_id: &CorrelationId, outcome: DeliveryOutcome) -> DeliveryRecord<'_> {
        DeliveryRecord {
            worker_id: 0,
            correlation_id,
            kind: MessageKind::Text,
            recipient: 42,
            outcome,
        }
    }

    #[test]
    fn test_from_sent() {
        assert_eq!(DeliveryOutcome::from_sent(true), DeliveryOutcome::Delivered);
        assert_eq!(DeliveryOutcome::from_sent(false), DeliveryOutcome::Failed);
    }

    #[test]
    fn test_logging_sink_counts_each_outcome() {
        let sink = LoggingOutcomeSink::new();
        let id = CorrelationId::default();

        sink.record(&record(&id, DeliveryOutcome::Delivered));
        sink.record(&record(&id, DeliveryOutcome::Delivered));
        sink.record(&record(&id, DeliveryOutcome::Failed));
        sink.record(&record(&id, DeliveryOutcome::Skipped));

        let stats = sink.stats();
        assert_eq!(
            stats,
            DeliveryStats {
                delivered: 2,
                failed: 1,
                skipped: 1,
            }
        );
        assert_eq!(stats.total(), 4);
    }
}

//! Dispatch pool.
//!
//! A fixed number of workers compete for messages on the shared bounded
//! channel. Each worker handles one message at a time:
//! 1. Dispatch on the message kind (TEXT → text, IMAGE → photo, other → skip)
//! 2. Call the delivery client once, without retry
//! 3. Report the outcome to the `OutcomeSink`
//!
//! Workers exit once every sender is dropped and the channel is drained.
//! `stop_processing` waits for that, bounded by a grace period.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::Instrument as _;

use relay_common::types::{MessageKind, MessageParam, TracedMessage};
use relay_notifier::DeliveryClient;

use crate::outcome::{DeliveryOutcome, DeliveryRecord, OutcomeSink};

/// What `stop_processing` observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Messages whose delivery attempt completed
    pub processed: u64,
    /// Messages a worker was still delivering when the grace period ran out
    pub abandoned_in_flight: usize,
    /// Messages still buffered in the channel when the grace period ran out
    pub abandoned_buffered: usize,
    pub timed_out: bool,
}

/// Turns one `TracedMessage` into one delivery call.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn DeliveryClient>,
    outcomes: Arc<dyn OutcomeSink>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn DeliveryClient>, outcomes: Arc<dyn OutcomeSink>) -> Self {
        Self { client, outcomes }
    }

    /// Deliver one message and report the outcome.
    pub async fn process_message(&self, worker_id: usize, msg: TracedMessage) -> DeliveryOutcome {
        let trace_id = msg.trace.trace_id();
        let span = tracing::info_span!(
            "dispatch",
            worker = worker_id,
            correlation_id = %msg.correlation_id,
            trace_id = trace_id.as_deref().unwrap_or(""),
        );

        async {
            tracing::info!(kind = %msg.message.kind, "Processing message");

            let message = &msg.message;
            let outcome = match message.kind {
                MessageKind::Text => DeliveryOutcome::from_sent(
                    self.client
                        .send_text(&msg.trace, message.user_id, &message.text)
                        .await,
                ),
                MessageKind::Image => DeliveryOutcome::from_sent(
                    self.client
                        .send_photo(
                            &msg.trace,
                            message.user_id,
                            &message.text,
                            message.params.get(MessageParam::FileUrl),
                            message.params.get(MessageParam::PhotoUrl),
                        )
                        .await,
                ),
                MessageKind::Other(_) => DeliveryOutcome::Skipped,
            };

            self.outcomes.record(&DeliveryRecord {
                worker_id,
                correlation_id: &msg.correlation_id,
                kind: message.kind,
                recipient: message.user_id,
                outcome,
            });

            outcome
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    processed: AtomicU64,
    in_flight: AtomicUsize,
}

/// Fixed-size pool of workers sharing one receiver.
pub struct DispatchPool {
    receiver: Arc<Mutex<mpsc::Receiver<TracedMessage>>>,
    dispatcher: Dispatcher,
    workers: JoinSet<()>,
    counters: Arc<PoolCounters>,
}

impl DispatchPool {
    pub fn new(receiver: mpsc::Receiver<TracedMessage>, dispatcher: Dispatcher) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            dispatcher,
            workers: JoinSet::new(),
            counters: Arc::new(PoolCounters::default()),
        }
    }

    /// Spawn `worker_count` workers. A count of zero is treated as one.
    pub fn start_processing(&mut self, worker_count: usize) {
        let worker_count = worker_count.max(1);
        for worker_id in 0..worker_count {
            let receiver = self.receiver.clone();
            let dispatcher = self.dispatcher.clone();
            let counters = self.counters.clone();
            self.workers
                .spawn(run_worker(worker_id, receiver, dispatcher, counters));
        }
        tracing::info!(workers = worker_count, "Dispatch pool started");
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Wait for the workers to drain the closed channel.
    ///
    /// The channel must be closed by dropping every sender first. After
    /// `grace`, remaining workers are aborted and whatever they held or
    /// left buffered is counted as abandoned.
    pub async fn stop_processing(mut self, grace: Duration) -> ShutdownReport {
        tracing::info!(grace_secs = grace.as_secs_f64(), "Stopping dispatch pool");

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = self.workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Dispatch worker failed");
                }
            }
        })
        .await;

        let mut report = ShutdownReport {
            processed: 0,
            abandoned_in_flight: 0,
            abandoned_buffered: 0,
            timed_out: drained.is_err(),
        };

        if report.timed_out {
            report.abandoned_in_flight = self.counters.in_flight.load(Ordering::SeqCst);
            self.workers.abort_all();
            while self.workers.join_next().await.is_some() {}

            let mut receiver = self.receiver.lock().await;
            receiver.close();
            while receiver.try_recv().is_ok() {
                report.abandoned_buffered += 1;
            }

            tracing::warn!(
                abandoned_in_flight = report.abandoned_in_flight,
                abandoned_buffered = report.abandoned_buffered,
                "Dispatch pool did not drain within the grace period"
            );
        }

        report.processed = self.counters.processed.load(Ordering::SeqCst);
        tracing::info!(
            processed = report.processed,
            timed_out = report.timed_out,
            "Dispatch pool stopped"
        );
        report
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TracedMessage>>>,
    dispatcher: Dispatcher,
    counters: Arc<PoolCounters>,
) {
    tracing::debug!(worker = worker_id, "Worker started");
    loop {
        // Only one worker waits on the channel at a time; the lock is released
        // before the message is processed.
        let next = receiver.lock().await.recv().await;
        let Some(msg) = next else {
            break;
        };

        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        dispatcher.process_message(worker_id, msg).await;
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        counters.processed.fetch_add(1, Ordering::SeqCst);
    }
    tracing::debug!(worker = worker_id, "Worker stopped, channel closed");
}

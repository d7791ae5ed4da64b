use std::sync::Arc;
use std::time::Duration;

use crate::interface::channel::{Channel, ChannelError};
use crate::interface::fix::{DecodeError, Fix};
use crate::interface::sink::PersistenceSink;
use crate::processing::run_state::RunState;
use crate::processing::store::FixStore;
use crate::telemetry::{LogManager, MetricsRecorder};

/// A decoded fix and whether its durable write succeeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ingested {
    pub fix: Fix,
    pub persisted: bool,
}

/// Per-batch tally of what happened to each delivered message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub appended: usize,
    pub decode_failures: usize,
    pub persistence_failures: usize,
}

/// Consumer loop: polls the channel, decodes each payload, writes it through
/// to the sink and appends it to the shared history.
///
/// Duplicated deliveries are appended as-is.
pub struct IngestionWorker<C: Channel, S: PersistenceSink> {
    channel: Arc<C>,
    subscription: C::Subscription,
    sink: Arc<S>,
    store: Arc<FixStore>,
    poll_timeout: Duration,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<C: Channel, S: PersistenceSink> IngestionWorker<C, S> {
    pub fn new(
        channel: Arc<C>,
        subscription: C::Subscription,
        sink: Arc<S>,
        store: Arc<FixStore>,
        poll_timeout: Duration,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            channel,
            subscription,
            sink,
            store,
            poll_timeout,
            metrics,
            logger: LogManager::new("trackcore::ingest"),
        }
    }

    /// Decodes, persists and appends one message. Only a decode failure
    /// keeps the fix out of the store.
    pub fn handle_message(&self, payload: &[u8]) -> Result<Ingested, DecodeError> {
        let fix = Fix::from_payload(payload)?;
        self.metrics.record_received();
        self.logger.fix_received(&fix);

        let persisted = match self.sink.insert(&fix) {
            Ok(()) => {
                self.logger.fix_persisted(&fix);
                true
            }
            Err(err) => {
                self.metrics.record_persistence_failure();
                self.logger
                    .anomaly(&format!("persisting {} failed: {}", fix, err));
                false
            }
        };

        self.store.append(fix);
        Ok(Ingested { fix, persisted })
    }

    /// Handles a delivered batch in delivery order. A bad message is skipped
    /// without affecting the rest of the batch.
    pub fn process_batch(&self, batch: &[Vec<u8>]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for payload in batch {
            match self.handle_message(payload) {
                Ok(ingested) => {
                    outcome.appended += 1;
                    if !ingested.persisted {
                        outcome.persistence_failures += 1;
                    }
                }
                Err(err) => {
                    outcome.decode_failures += 1;
                    self.metrics.record_decode_failure();
                    self.logger.anomaly(&format!(
                        "skipping message {:?}: {}",
                        String::from_utf8_lossy(payload),
                        err
                    ));
                }
            }
        }
        outcome
    }

    /// Runs until the run state stops or the channel fails terminally.
    pub async fn run(mut self, state: RunState) -> Result<(), ChannelError> {
        while state.is_running() {
            match self
                .channel
                .poll(&mut self.subscription, self.poll_timeout)
                .await
            {
                Ok(batch) => {
                    self.process_batch(&batch);
                }
                Err(err) if err.is_terminal() => {
                    self.logger
                        .failure(&format!("consumer stopping: {}", err));
                    state.stop();
                    return Err(err);
                }
                Err(err) => {
                    self.logger.anomaly(&format!("poll failed: {}", err));
                    // Retry on the next cycle rather than spinning on a failing broker.
                    state.sleep(self.poll_timeout).await;
                }
            }
        }
        self.logger.record("consumer stopped");
        Ok(())
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::interface::channel::{Channel, ChannelError};
use crate::interface::sink::PersistenceSink;
use crate::math::path::PathHelper;
use crate::prelude::{PipelineConfig, PipelineError, PipelineResult};
use crate::processing::ingest::IngestionWorker;
use crate::processing::motion::MotionSimulator;
use crate::processing::reporter::DistanceReporter;
use crate::processing::run_state::RunState;
use crate::processing::store::FixStore;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};

/// Final accounting of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub fixes: usize,
    pub total_km: f64,
    pub metrics: MetricsSnapshot,
}

/// Closes the channel and sink exactly once when dropped, whichever way
/// the run ends.
struct ResourceGuard<C: Channel, S: PersistenceSink> {
    channel: Arc<C>,
    sink: Arc<S>,
    released: AtomicBool,
    logger: LogManager,
}

impl<C: Channel, S: PersistenceSink> ResourceGuard<C, S> {
    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.channel.close();
        self.sink.close();
        self.logger.record("channel and sink released");
    }
}

impl<C: Channel, S: PersistenceSink> Drop for ResourceGuard<C, S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns the shared resources and runs the producer, consumer and reporter
/// as independent tasks.
pub struct Coordinator<C: Channel, S: PersistenceSink> {
    config: PipelineConfig,
    channel: Arc<C>,
    sink: Arc<S>,
    store: Arc<FixStore>,
    metrics: Arc<MetricsRecorder>,
    state: RunState,
    logger: LogManager,
}

impl<C: Channel, S: PersistenceSink> Coordinator<C, S> {
    pub fn new(config: PipelineConfig, channel: C, sink: S) -> Self {
        Self::with_shared(config, Arc::new(channel), Arc::new(sink))
    }

    /// Builds a coordinator around resources the caller keeps a handle to.
    pub fn with_shared(config: PipelineConfig, channel: Arc<C>, sink: Arc<S>) -> Self {
        Self {
            config,
            channel,
            sink,
            store: Arc::new(FixStore::new()),
            metrics: Arc::new(MetricsRecorder::new()),
            state: RunState::new(),
            logger: LogManager::new("trackcore::coordinator"),
        }
    }

    pub fn run_state(&self) -> RunState {
        self.state.clone()
    }

    pub fn store(&self) -> Arc<FixStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    /// Runs all three loops until the run state stops, then releases the
    /// channel and sink.
    ///
    /// Returns an error when startup fails, when a loop ends on a terminal
    /// channel failure, or when a task panics. Resources are released in
    /// every case.
    pub async fn run(self) -> PipelineResult<RunSummary> {
        let guard = ResourceGuard {
            channel: self.channel.clone(),
            sink: self.sink.clone(),
            released: AtomicBool::new(false),
            logger: self.logger.clone(),
        };

        if let Err(err) = self.config.validate() {
            self.state.stop();
            return Err(err);
        }

        let subscription = match self.channel.subscribe(&self.config.topic) {
            Ok(subscription) => subscription,
            Err(err) => {
                self.state.stop();
                self.logger
                    .failure(&format!("subscribing to {}: {}", self.config.topic, err));
                return Err(PipelineError::Startup(format!(
                    "subscribing to {}: {}",
                    self.config.topic, err
                )));
            }
        };

        let producer = MotionSimulator::new(&self.config, self.channel.clone(), self.metrics.clone());
        let consumer = IngestionWorker::new(
            self.channel.clone(),
            subscription,
            self.sink.clone(),
            self.store.clone(),
            self.config.poll_timeout(),
            self.metrics.clone(),
        );
        let reporter = DistanceReporter::new(
            self.store.clone(),
            self.config.report_interval(),
            self.metrics.clone(),
        );

        self.logger.record(&format!(
            "pipeline started on topic {}",
            self.config.topic
        ));
        let producer = tokio::spawn(producer.run(self.state.clone()));
        let consumer = tokio::spawn(consumer.run(self.state.clone()));
        let reporter_state = self.state.clone();
        let reporter = tokio::spawn(async move {
            reporter.run(reporter_state).await;
            Ok::<(), ChannelError>(())
        });

        let (producer, consumer, reporter) = tokio::join!(
            self.settle("producer", producer),
            self.settle("consumer", consumer),
            self.settle("reporter", reporter),
        );

        drop(guard);

        let fixes = self.store.snapshot();
        let summary = RunSummary {
            fixes: fixes.len(),
            total_km: PathHelper::cumulative_km(&fixes),
            metrics: self.metrics.snapshot(),
        };
        self.logger.record(&format!(
            "pipeline stopped: {} fixes, {:.6} km",
            summary.fixes, summary.total_km
        ));

        producer.and(consumer).and(reporter).map(|_| summary)
    }

    /// Waits for one task and maps its outcome. Any failure stops the rest.
    async fn settle(
        &self,
        task: &'static str,
        handle: JoinHandle<Result<(), ChannelError>>,
    ) -> PipelineResult<()> {
        let outcome = match handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(PipelineError::Channel { task, source }),
            Err(_) => Err(PipelineError::TaskPanicked(task)),
        };
        if let Err(err) = &outcome {
            self.logger.failure(&err.to_string());
            self.state.stop();
        }
        outcome
    }
}

use crate::status_bridge::{status_bind_address, StatusBridge};
use crate::workflow::config::TrackerConfig;
use crate::workflow::storage::TrackerSink;
use anyhow::Context;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use trackcore::interface::{Channel, MemoryChannel};
use trackcore::processing::{Coordinator, RunState, RunSummary};

/// Builds the channel and sink, runs the pipeline and tears it down.
#[derive(Clone)]
pub struct Runner {
    config: TrackerConfig,
}

impl Runner {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self, serve: bool) -> anyhow::Result<RunSummary> {
        let pipeline = self.config.to_pipeline_config();
        pipeline.validate().context("validating pipeline config")?;
        let channel = Arc::new(MemoryChannel::new(pipeline.max_batch));
        self.execute_on(channel, serve).await
    }

    /// Runs the pipeline over a caller-built channel. The channel is closed
    /// on every exit path, including a failure to open the sink.
    pub async fn execute_on<C: Channel>(
        &self,
        channel: Arc<C>,
        serve: bool,
    ) -> anyhow::Result<RunSummary> {
        let pipeline = self.config.to_pipeline_config();
        if let Err(err) = pipeline.validate() {
            channel.close();
            return Err(err).context("validating pipeline config");
        }

        let sink = match TrackerSink::open(self.config.persistence_path.as_deref()) {
            Ok(sink) => Arc::new(sink),
            Err(err) => {
                channel.close();
                return Err(err).context("opening persistence sink");
            }
        };
        log::info!(
            "tracking topic {} with {} persistence",
            pipeline.topic,
            sink.describe()
        );

        let coordinator = Coordinator::with_shared(pipeline, channel, sink);
        let state = coordinator.run_state();

        let bridge = if serve {
            match StatusBridge::start(
                status_bind_address(self.config.status_port),
                coordinator.store(),
                coordinator.metrics(),
                state.clone(),
            ) {
                Ok(bridge) => Some(bridge),
                Err(err) => {
                    log::warn!("status endpoint disabled: {:#}", err);
                    None
                }
            }
        } else {
            None
        };

        let trigger = tokio::spawn(stop_trigger(state.clone(), self.config.run_for()));
        let outcome = coordinator.run().await;

        state.stop();
        if let Err(err) = trigger.await {
            log::warn!("stop trigger task failed: {}", err);
        }
        if let Some(bridge) = bridge {
            bridge.join().await;
        }

        outcome.context("running location pipeline")
    }
}

/// Stops the run on Ctrl+C or once `run_for` elapses, whichever comes first.
async fn stop_trigger(state: RunState, run_for: Option<Duration>) {
    let deadline = async {
        match run_for {
            Some(period) => tokio::time::sleep(period).await,
            None => future::pending::<()>().await,
        }
    };

    let interrupted = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Ctrl+C received, shutting down"),
            Err(err) => {
                // Without a signal handler only the deadline or an internal
                // failure can end the run.
                log::warn!("cannot listen for Ctrl+C: {}", err);
                future::pending::<()>().await
            }
        }
    };

    tokio::select! {
        _ = interrupted => {}
        _ = deadline => log::info!("run duration elapsed, shutting down"),
        _ = state.stopped() => {}
    }
    state.stop();
}

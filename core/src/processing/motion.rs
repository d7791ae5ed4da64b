use std::sync::Arc;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::interface::channel::{Channel, ChannelError};
use crate::interface::fix::Fix;
use crate::prelude::PipelineConfig;
use crate::processing::run_state::RunState;
use crate::telemetry::{LogManager, MetricsRecorder};

/// Producer loop: walks a position in small random steps and publishes each
/// new position to the channel at a fixed cadence.
///
/// The walk is not clamped, so a long enough run can leave the valid
/// coordinate range. Such fixes are still published; the consumer rejects
/// them on decode.
pub struct MotionSimulator<C: Channel> {
    channel: Arc<C>,
    topic: String,
    position: Fix,
    step_degrees: f64,
    interval: Duration,
    rng: StdRng,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<C: Channel> MotionSimulator<C> {
    pub fn new(config: &PipelineConfig, channel: Arc<C>, metrics: Arc<MetricsRecorder>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            channel,
            topic: config.topic.clone(),
            position: config.start(),
            step_degrees: config.step_degrees,
            interval: config.publish_interval(),
            rng,
            metrics,
            logger: LogManager::new("trackcore::producer"),
        }
    }

    pub fn position(&self) -> Fix {
        self.position
    }

    /// Advances the walk by one step drawn uniformly from
    /// `[-step_degrees, step_degrees]` on each axis.
    pub fn advance(&mut self) -> Fix {
        let (dlat, dlon) = if self.step_degrees > 0.0 {
            (
                self.rng.gen_range(-self.step_degrees..=self.step_degrees),
                self.rng.gen_range(-self.step_degrees..=self.step_degrees),
            )
        } else {
            (0.0, 0.0)
        };
        self.position.latitude += dlat;
        self.position.longitude += dlon;
        self.position
    }

    /// Advances once and publishes the new position.
    pub fn emit(&mut self) -> Result<Fix, ChannelError> {
        let fix = self.advance();
        let payload = fix.encode();
        match self.channel.publish(&self.topic, payload.clone().into_bytes()) {
            Ok(()) => {
                self.metrics.record_published();
                self.logger.fix_sent(&payload);
                Ok(fix)
            }
            Err(err) => {
                self.metrics.record_publish_failure();
                Err(err)
            }
        }
    }

    /// Runs until the run state stops or the channel fails terminally.
    pub async fn run(mut self, state: RunState) -> Result<(), ChannelError> {
        while state.is_running() {
            match self.emit() {
                Ok(_) => {}
                Err(err) if err.is_terminal() => {
                    self.logger
                        .failure(&format!("producer stopping: {}", err));
                    state.stop();
                    return Err(err);
                }
                Err(err) => self.logger.anomaly(&format!("publish failed: {}", err)),
            }
            if !state.sleep(self.interval).await {
                break;
            }
        }
        self.logger.record("producer stopped");
        Ok(())
    }
}

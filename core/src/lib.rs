//! Ingestion and aggregation core for the location tracker.
//!
//! A motion simulator publishes positional fixes to an ordered channel, an
//! ingestion worker persists and collects them, and a reporter periodically
//! reduces the collected history to a cumulative great-circle distance.

pub mod interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use interface::{Channel, Fix, PersistenceSink};
pub use prelude::{PipelineConfig, PipelineError, PipelineResult};
pub use processing::{Coordinator, RunState, RunSummary};

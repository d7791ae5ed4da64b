pub mod coordinator;
pub mod ingest;
pub mod motion;
pub mod reporter;
pub mod run_state;
pub mod store;

pub use coordinator::{Coordinator, RunSummary};
pub use ingest::{BatchOutcome, Ingested, IngestionWorker};
pub use motion::MotionSimulator;
pub use reporter::{DistanceReport, DistanceReporter};
pub use run_state::RunState;
pub use store::FixStore;

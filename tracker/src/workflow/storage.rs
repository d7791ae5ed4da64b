use std::path::Path;

use trackcore::interface::{
    Fix, JsonLinesSink, MemorySink, PersistenceResult, PersistenceSink,
};

/// Sink chosen at startup from the tracker configuration.
pub enum TrackerSink {
    Memory(MemorySink),
    JsonLines(JsonLinesSink),
}

impl TrackerSink {
    pub fn open(path: Option<&Path>) -> PersistenceResult<Self> {
        match path {
            Some(path) => Ok(Self::JsonLines(JsonLinesSink::open(path)?)),
            None => Ok(Self::Memory(MemorySink::new())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Memory(_) => "in-memory".to_string(),
            Self::JsonLines(sink) => sink.path().display().to_string(),
        }
    }
}

impl PersistenceSink for TrackerSink {
    fn insert(&self, fix: &Fix) -> PersistenceResult<()> {
        match self {
            Self::Memory(sink) => sink.insert(fix),
            Self::JsonLines(sink) => sink.insert(fix),
        }
    }

    fn close(&self) {
        match self {
            Self::Memory(sink) => sink.close(),
            Self::JsonLines(sink) => sink.close(),
        }
    }
}

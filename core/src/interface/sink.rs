use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::interface::fix::Fix;

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("sink closed")]
    Closed,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Durable single-row write of one fix.
pub trait PersistenceSink: Send + Sync + 'static {
    fn insert(&self, fix: &Fix) -> PersistenceResult<()>;

    /// Releases the underlying handle. Later inserts fail with [`PersistenceError::Closed`].
    fn close(&self);
}

/// Keeps inserted fixes in memory, in insertion order.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<Fix>>,
    closed: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<Fix> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.lock().map(|closed| *closed).unwrap_or(true)
    }
}

impl PersistenceSink for MemorySink {
    fn insert(&self, fix: &Fix) -> PersistenceResult<()> {
        if self.is_closed() {
            return Err(PersistenceError::Closed);
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| PersistenceError::Unavailable("row buffer poisoned".into()))?;
        rows.push(*fix);
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }
}

/// Appends one JSON object per fix to a file, flushing after every insert.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLinesSink {
    pub fn open<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                PersistenceError::Unavailable(format!("creating {}: {}", parent.display(), err))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| {
                PersistenceError::Unavailable(format!("opening {}: {}", path.display(), err))
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceSink for JsonLinesSink {
    fn insert(&self, fix: &Fix) -> PersistenceResult<()> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| PersistenceError::Unavailable("writer poisoned".into()))?;
        let writer = guard.as_mut().ok_or(PersistenceError::Closed)?;

        let mut line =
            serde_json::to_vec(fix).map_err(|err| PersistenceError::Write(err.to_string()))?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .and_then(|_| writer.flush())
            .map_err(|err| PersistenceError::Write(err.to_string()))
    }

    fn close(&self) {
        if let Ok(mut guard) = self.writer.lock() {
            if let Some(mut writer) = guard.take() {
                if let Err(err) = writer.flush() {
                    log::warn!("flushing {} on close: {}", self.path.display(), err);
                }
            }
        }
    }
}

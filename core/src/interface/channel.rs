use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};

/// Transport failures. Transient errors are retried on the next cycle;
/// terminal errors end the owning loop and trigger a coordinated shutdown.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("transient channel failure: {0}")]
    Transient(String),
    #[error("channel unrecoverable: {0}")]
    Terminal(String),
}

impl ChannelError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelError::Terminal(_))
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Ordered, durable, at-least-once publish/subscribe transport.
///
/// Implementations must preserve publish order per producer. Consumers are
/// expected to tolerate duplicates.
pub trait Channel: Send + Sync + 'static {
    type Subscription: Send + 'static;

    fn publish(&self, topic: &str, payload: Vec<u8>) -> ChannelResult<()>;

    fn subscribe(&self, topic: &str) -> ChannelResult<Self::Subscription>;

    /// Waits at most `timeout` for pending messages. An empty batch means the
    /// wait elapsed with nothing to deliver.
    fn poll(
        &self,
        subscription: &mut Self::Subscription,
        timeout: Duration,
    ) -> impl Future<Output = ChannelResult<Vec<Vec<u8>>>> + Send;

    /// Releases the transport. Later calls fail with a terminal error.
    fn close(&self);
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<u8>>>,
    closed: bool,
}

/// In-process broker keeping an append-only log per topic.
pub struct MemoryChannel {
    state: Mutex<BrokerState>,
    version: watch::Sender<u64>,
    max_batch: usize,
}

/// Read position of one subscriber within a topic log.
#[derive(Debug)]
pub struct MemorySubscription {
    topic: String,
    offset: usize,
}

impl MemorySubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl MemoryChannel {
    pub fn new(max_batch: usize) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: Mutex::new(BrokerState::default()),
            version,
            max_batch: max_batch.max(1),
        }
    }

    /// Number of messages retained for `topic`.
    pub fn retained(&self, topic: &str) -> usize {
        self.lock()
            .topics
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        // The log is only ever appended to, so a poisoned guard still holds a
        // consistent prefix.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_pending(&self, subscription: &mut MemorySubscription) -> ChannelResult<Vec<Vec<u8>>> {
        let state = self.lock();
        if state.closed {
            return Err(ChannelError::Terminal("channel closed".into()));
        }
        let Some(log) = state.topics.get(&subscription.topic) else {
            return Ok(Vec::new());
        };
        let end = log.len().min(subscription.offset + self.max_batch);
        let batch = log[subscription.offset..end].to_vec();
        subscription.offset = end;
        Ok(batch)
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(500)
    }
}

impl Channel for MemoryChannel {
    type Subscription = MemorySubscription;

    fn publish(&self, topic: &str, payload: Vec<u8>) -> ChannelResult<()> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(ChannelError::Terminal("channel closed".into()));
            }
            state
                .topics
                .entry(topic.to_string())
                .or_default()
                .push(payload);
        }
        self.version.send_modify(|version| *version += 1);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> ChannelResult<MemorySubscription> {
        if topic.is_empty() {
            return Err(ChannelError::Terminal("empty topic name".into()));
        }
        if self.lock().closed {
            return Err(ChannelError::Terminal("channel closed".into()));
        }
        Ok(MemorySubscription {
            topic: topic.to_string(),
            offset: 0,
        })
    }

    async fn poll(
        &self,
        subscription: &mut MemorySubscription,
        timeout: Duration,
    ) -> ChannelResult<Vec<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        // Subscribing before the check means a publish racing with it still
        // marks the receiver as changed.
        let mut changes = self.version.subscribe();
        loop {
            let batch = self.take_pending(subscription)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            match timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(ChannelError::Terminal("broker dropped".into())),
                Err(_) => return Ok(Vec::new()),
            }
        }
    }

    fn close(&self) {
        self.lock().closed = true;
        self.version.send_modify(|version| *version += 1);
    }
}

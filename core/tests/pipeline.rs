use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use trackcore::interface::{
    Channel, ChannelError, ChannelResult, Fix, MemoryChannel, MemorySink, MemorySubscription,
    PersistenceError, PersistenceResult, PersistenceSink,
};
use trackcore::math::GeoHelper;
use trackcore::processing::{Coordinator, DistanceReporter, FixStore, IngestionWorker, RunState};
use trackcore::telemetry::MetricsRecorder;
use trackcore::{PipelineConfig, PipelineError};

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        publish_interval_ms: 5,
        poll_timeout_ms: 5,
        report_interval_ms: 10,
        seed: Some(2024),
        ..Default::default()
    }
}

/// Wraps a memory channel and fails publishes according to a script.
struct ScriptedChannel {
    inner: MemoryChannel,
    publishes: AtomicUsize,
    transient_first: usize,
    terminal_after: Option<usize>,
}

impl ScriptedChannel {
    fn new(transient_first: usize, terminal_after: Option<usize>) -> Self {
        Self {
            inner: MemoryChannel::default(),
            publishes: AtomicUsize::new(0),
            transient_first,
            terminal_after,
        }
    }
}

impl Channel for ScriptedChannel {
    type Subscription = MemorySubscription;

    fn publish(&self, topic: &str, payload: Vec<u8>) -> ChannelResult<()> {
        let attempt = self.publishes.fetch_add(1, Ordering::SeqCst);
        if attempt < self.transient_first {
            return Err(ChannelError::Transient("broker busy".into()));
        }
        if let Some(limit) = self.terminal_after {
            if attempt >= limit {
                return Err(ChannelError::Terminal("broker gone".into()));
            }
        }
        self.inner.publish(topic, payload)
    }

    fn subscribe(&self, topic: &str) -> ChannelResult<MemorySubscription> {
        self.inner.subscribe(topic)
    }

    async fn poll(
        &self,
        subscription: &mut MemorySubscription,
        timeout: Duration,
    ) -> ChannelResult<Vec<Vec<u8>>> {
        self.inner.poll(subscription, timeout).await
    }

    fn close(&self) {
        self.inner.close();
    }
}

/// Rejects every other insert.
#[derive(Default)]
struct FlakySink {
    inner: MemorySink,
    attempts: AtomicUsize,
}

impl PersistenceSink for FlakySink {
    fn insert(&self, fix: &Fix) -> PersistenceResult<()> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(PersistenceError::Write("constraint violated".into()));
        }
        self.inner.insert(fix)
    }

    fn close(&self) {
        self.inner.close();
    }
}

async fn wait_for_len(store: &FixStore, len: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while store.len() < len {
        assert!(Instant::now() < deadline, "store never reached {} fixes", len);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn three_published_fixes_produce_expected_distance() {
    let channel = Arc::new(MemoryChannel::default());
    let subscription = channel.subscribe("location-update").unwrap();
    let store = Arc::new(FixStore::new());
    let metrics = Arc::new(MetricsRecorder::new());
    let worker = IngestionWorker::new(
        channel.clone(),
        subscription,
        Arc::new(MemorySink::new()),
        store.clone(),
        Duration::from_millis(5),
        metrics.clone(),
    );
    let state = RunState::new();
    let consumer = tokio::spawn(worker.run(state.clone()));

    let path = [Fix::new(0.0, 0.0), Fix::new(0.0, 1.0), Fix::new(1.0, 1.0)];
    for fix in &path {
        channel.publish("location-update", fix.to_payload()).unwrap();
    }
    wait_for_len(&store, 3).await;
    state.stop();
    consumer.await.unwrap().unwrap();

    let reporter = DistanceReporter::new(store.clone(), Duration::from_secs(5), metrics);
    let report = reporter.compute();
    let expected =
        GeoHelper::distance_km(&path[0], &path[1]) + GeoHelper::distance_km(&path[1], &path[2]);
    assert_eq!(report.fixes, 3);
    assert!((report.total_km - expected).abs() < 1e-6);
}

#[tokio::test]
async fn coordinator_run_collects_and_persists_every_fix() {
    let channel = Arc::new(MemoryChannel::default());
    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::with_shared(fast_config(), channel.clone(), sink.clone());
    let state = coordinator.run_state();
    let store = coordinator.store();
    let handle = tokio::spawn(coordinator.run());

    wait_for_len(&store, 5).await;
    state.stop();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.fixes, store.len());
    assert_eq!(sink.rows(), store.snapshot());
    assert_eq!(summary.metrics.received, summary.fixes);
    assert!(summary.metrics.published >= summary.fixes);
    assert!(summary.total_km > 0.0);
    assert!(channel.is_closed());
    assert!(sink.is_closed());
}

#[tokio::test]
async fn malformed_messages_do_not_stop_ingestion() {
    let channel = Arc::new(MemoryChannel::default());
    let coordinator =
        Coordinator::with_shared(fast_config(), channel.clone(), Arc::new(MemorySink::new()));
    let state = coordinator.run_state();
    let store = coordinator.store();
    let metrics = coordinator.metrics();
    let handle = tokio::spawn(coordinator.run());

    channel.publish("location-update", b"abc".to_vec()).unwrap();
    channel.publish("location-update", b"1.0".to_vec()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while metrics.snapshot().decode_failures < 2 {
        assert!(Instant::now() < deadline, "malformed messages were never consumed");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let before = store.len();
    wait_for_len(&store, before + 2).await;
    assert!(state.is_running());
    state.stop();
    handle.await.unwrap().unwrap();

    assert_eq!(metrics.snapshot().decode_failures, 2);
}

#[tokio::test]
async fn persistence_failures_keep_fixes_in_history() {
    let sink = Arc::new(FlakySink::default());
    let coordinator =
        Coordinator::with_shared(fast_config(), Arc::new(MemoryChannel::default()), sink.clone());
    let state = coordinator.run_state();
    let store = coordinator.store();
    let handle = tokio::spawn(coordinator.run());

    wait_for_len(&store, 4).await;
    state.stop();
    let summary = handle.await.unwrap().unwrap();

    assert!(summary.metrics.persistence_failures >= 1);
    assert_eq!(summary.fixes, summary.metrics.received);
    assert_eq!(
        sink.inner.rows().len() + summary.metrics.persistence_failures,
        summary.fixes
    );
}

#[tokio::test]
async fn transient_publish_failures_are_retried_next_cycle() {
    let channel = Arc::new(ScriptedChannel::new(2, None));
    let coordinator =
        Coordinator::with_shared(fast_config(), channel.clone(), Arc::new(MemorySink::new()));
    let state = coordinator.run_state();
    let store = coordinator.store();
    let handle = tokio::spawn(coordinator.run());

    wait_for_len(&store, 2).await;
    assert!(state.is_running());
    state.stop();
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.metrics.publish_failures, 2);
}

#[tokio::test]
async fn terminal_channel_failure_shuts_down_all_loops() {
    let channel = Arc::new(ScriptedChannel::new(0, Some(3)));
    let coordinator =
        Coordinator::with_shared(fast_config(), channel.clone(), Arc::new(MemorySink::new()));
    let state = coordinator.run_state();

    let result = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("coordinator did not shut down");

    match result {
        Err(PipelineError::Channel { task, source }) => {
            assert_eq!(task, "producer");
            assert!(source.is_terminal());
        }
        other => panic!("unexpected outcome: {:?}", other.map(|s| s.fixes)),
    }
    assert!(!state.is_running());
    assert!(channel.inner.is_closed());
}

#[tokio::test]
async fn stop_is_observed_within_one_cadence() {
    let config = PipelineConfig {
        publish_interval_ms: 50,
        poll_timeout_ms: 50,
        report_interval_ms: 80,
        ..fast_config()
    };
    let ceiling = config.shutdown_ceiling();
    let coordinator = Coordinator::new(config, MemoryChannel::default(), MemorySink::new());
    let state = coordinator.run_state();
    let handle = tokio::spawn(coordinator.run());

    tokio::time::sleep(Duration::from_millis(120)).await;
    let stopped_at = Instant::now();
    state.stop();
    handle.await.unwrap().unwrap();
    assert!(
        stopped_at.elapsed() <= ceiling + Duration::from_millis(500),
        "shutdown took {:?}",
        stopped_at.elapsed()
    );
}

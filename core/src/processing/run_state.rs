use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Process-wide cooperative cancellation flag.
///
/// Starts running and flips to stopped at most once. Loops check
/// [`RunState::is_running`] at each iteration boundary; timed waits go through
/// [`RunState::sleep`] so they end early once the flag flips.
#[derive(Clone)]
pub struct RunState {
    running: Arc<AtomicBool>,
    signal: Arc<watch::Sender<bool>>,
}

impl RunState {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(true);
        Self {
            running: Arc::new(AtomicBool::new(true)),
            signal: Arc::new(signal),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Flips the flag to stopped. Returns `true` only for the call that
    /// performed the transition.
    pub fn stop(&self) -> bool {
        let transitioned = self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if transitioned {
            self.signal.send_replace(false);
        }
        transitioned
    }

    /// Resolves once the flag is stopped.
    pub async fn stopped(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Sleeps for `period`, returning early if the run stops. Returns whether
    /// the pipeline is still running afterwards.
    pub async fn sleep(&self, period: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = self.stopped() => {}
        }
        self.is_running()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use trackcore::processing::{FixStore, RunState};
use trackcore::telemetry::MetricsRecorder;
use warp::Filter;

use crate::status_bridge::model::StatusModel;

pub fn status_bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Read-only HTTP view of the running pipeline.
pub struct StatusBridge {
    address: SocketAddr,
    server: JoinHandle<()>,
}

impl StatusBridge {
    pub fn routes(
        store: Arc<FixStore>,
        metrics: Arc<MetricsRecorder>,
        state: RunState,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || warp::reply::json(&StatusModel::capture(&store, &metrics, &state)))
    }

    /// Binds the status endpoint and serves it until the run state stops.
    pub fn start(
        address: SocketAddr,
        store: Arc<FixStore>,
        metrics: Arc<MetricsRecorder>,
        state: RunState,
    ) -> anyhow::Result<Self> {
        let shutdown = state.clone();
        let routes = Self::routes(store, metrics, state);
        let (address, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(address, async move { shutdown.stopped().await })
            .with_context(|| format!("binding status endpoint on {}", address))?;
        let bridge = Self {
            address,
            server: tokio::spawn(server),
        };
        log::info!("status endpoint listening on http://{}/status", bridge.address());
        Ok(bridge)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub async fn join(self) {
        if let Err(err) = self.server.await {
            log::warn!("status endpoint task failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackcore::interface::Fix;

    #[tokio::test]
    async fn status_route_reports_store_and_metrics() {
        let store = Arc::new(FixStore::new());
        store.append(Fix::new(0.0, 0.0));
        store.append(Fix::new(0.0, 1.0));
        let metrics = Arc::new(MetricsRecorder::new());
        metrics.record_report(111.19, 0);
        let routes = StatusBridge::routes(store, metrics, RunState::new());

        let response = warp::test::request()
            .method("GET")
            .path("/status")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["running"], true);
        assert_eq!(body["fixes"], 2);
        assert_eq!(body["distance_km"], 111.19);
        assert_eq!(body["last_fix"]["longitude"], 1.0);
        assert_eq!(body["metrics"]["reports"], 1);
    }

    #[tokio::test]
    async fn unknown_path_is_rejected() {
        let routes = StatusBridge::routes(
            Arc::new(FixStore::new()),
            Arc::new(MetricsRecorder::new()),
            RunState::new(),
        );
        let response = warp::test::request()
            .method("GET")
            .path("/payload")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn server_stops_with_run_state() {
        let state = RunState::new();
        let bridge = StatusBridge::start(
            status_bind_address(0),
            Arc::new(FixStore::new()),
            Arc::new(MetricsRecorder::new()),
            state.clone(),
        )
        .unwrap();
        assert_ne!(bridge.address().port(), 0);

        state.stop();
        tokio::time::timeout(std::time::Duration::from_secs(5), bridge.join())
            .await
            .unwrap();
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::backend::{Backend, BackendSet};
use crate::config::HealthCheckConfig;

/// Periodic prober that flips backend availability based on consecutive
/// probe outcomes (hysteresis). Owns one ticker and one HTTP client.
pub struct HealthSupervisor {
    backends: BackendSet,
    config: HealthCheckConfig,
    client: reqwest::Client,
    shutdown: Arc<Notify>,
}

impl HealthSupervisor {
    pub fn new(backends: BackendSet, config: HealthCheckConfig) -> anyhow::Result<Self> {
        let timeout = config.timeout_duration()?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            backends,
            config,
            client,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Spawns the periodic probe loop. Returns immediately; call `stop()` to
    /// cancel it and wait for the in-flight tick to finish.
    pub fn start(&self) -> anyhow::Result<tokio::task::JoinHandle<()>> {
        let interval = self.config.interval_duration()?;
        let backends = self.backends.clone();
        let config = self.config.clone();
        let client = self.client.clone();
        let shutdown = self.shutdown.clone();

        Ok(tokio::spawn(async move {
            loop {
                if sleep_or_shutdown(interval, &shutdown).await {
                    return;
                }
                probe_all(&backends, &config, &client).await;
            }
        }))
    }

    /// Cancels the timer and waits up to 5s for the in-flight tick to finish.
    pub async fn stop(&self, handle: tokio::task::JoinHandle<()>) {
        self.shutdown.notify_one();
        if tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .is_err()
        {
            tracing::warn!("health supervisor: in-flight tick did not finish within grace period");
        }
    }
}

async fn sleep_or_shutdown(duration: Duration, shutdown: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.notified() => true,
    }
}

async fn probe_all(backends: &BackendSet, config: &HealthCheckConfig, client: &reqwest::Client) {
    for backend in backends.all() {
        probe_one(backend, config, client).await;
    }
}

async fn probe_one(backend: &Arc<Backend>, config: &HealthCheckConfig, client: &reqwest::Client) {
    let url = format!("http://{}:{}{}", backend.host, backend.port, config.path);
    let outcome = client.get(&url).send().await;

    let healthy = matches!(&outcome, Ok(resp) if resp.status().as_u16() == 200);

    if healthy {
        let successes = backend.record_success();
        if !backend.is_available() && successes >= config.healthy_threshold {
            backend.set_available(true);
            backend.reset_successes();
            tracing::info!("backend {} recovered, marking available", backend.address());
        }
    } else {
        let failures = backend.record_failure();
        if backend.is_available() && failures >= config.unhealthy_threshold {
            backend.set_available(false);
            tracing::warn!("backend {} failed {} consecutive probes, marking unavailable", backend.address(), failures);
        }
    }
}

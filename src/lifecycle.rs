use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::backend::BackendSet;
use crate::balance::SelectionPolicy;
use crate::config::{Algorithm, ProxyConfig};
use crate::health::HealthSupervisor;

/// Owns the whole running proxy: backend records, selection policy, the
/// health supervisor (if enabled), and the acceptor. Idempotent start/stop.
///
/// Start order: Backend records → SelectionPolicy → supervisor → acceptor.
/// Stop order is the reverse. A failed start runs the stop path before
/// returning the error.
pub struct LifecycleController {
    config: ProxyConfig,
    backends: Arc<BackendSet>,
    policy: Arc<SelectionPolicy>,
    running: AtomicBool,
    shutdown: Arc<Notify>,
    supervisor: std::sync::Mutex<Option<(HealthSupervisor, JoinHandle<()>)>>,
    acceptor: std::sync::Mutex<Option<JoinHandle<Result<()>>>>,
}

impl LifecycleController {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let algorithm = Algorithm::from_str(&config.algorithm).map_err(|e| anyhow::anyhow!(e))?;
        let backends = Arc::new(BackendSet::new(config.backends.clone()));
        let policy = Arc::new(SelectionPolicy::new(algorithm));

        Ok(Self {
            config,
            backends,
            policy,
            running: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
            supervisor: std::sync::Mutex::new(None),
            acceptor: std::sync::Mutex::new(None),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            bail!("already running");
        }

        if let Err(e) = self.start_inner().await {
            self.stop().await.ok();
            return Err(e);
        }

        Ok(())
    }

    async fn start_inner(&self) -> Result<()> {
        if self.config.health_check.enabled {
            let supervisor = HealthSupervisor::new(
                (*self.backends).clone(),
                self.config.health_check.clone(),
            )?;
            let handle = supervisor.start()?;
            *self.supervisor.lock().unwrap() = Some((supervisor, handle));
        }

        let handle = tokio::spawn({
            let host = self.config.server.host.clone();
            let port = self.config.server.port;
            let pool_size = self.config.server.thread_pool_size;
            let backends = self.backends.clone();
            let policy = self.policy.clone();
            let shutdown = self.shutdown.clone();
            async move {
                crate::server::run_acceptor(&host, port, pool_size, backends, policy, shutdown)
                    .await
            }
        });
        *self.acceptor.lock().unwrap() = Some(handle);

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            bail!("not running");
        }

        // notify_one, not notify_waiters: there is exactly one acceptor task
        // waiting on this signal, and notify_one stores a permit even if the
        // acceptor hasn't reached its select! yet, so the shutdown can never
        // be missed by a race between spawn and the first poll.
        self.shutdown.notify_one();

        if let Some(handle) = self.acceptor.lock().unwrap().take() {
            if let Err(e) = handle.await {
                tracing::error!("acceptor task join error: {}", e);
            }
        }

        if let Some((supervisor, handle)) = self.supervisor.lock().unwrap().take() {
            supervisor.stop(handle).await;
        }

        Ok(())
    }

    /// Plain-text status summary: listen address, policy, per-backend state.
    pub fn status_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "listening: {}:{}\n",
            self.config.server.host, self.config.server.port
        ));
        out.push_str(&format!("algorithm: {}\n", self.config.algorithm));
        out.push_str(&format!(
            "running: {}\n",
            if self.is_running() { "yes" } else { "no" }
        ));
        for backend in self.backends.all() {
            let state = if backend.is_available() {
                "AVAILABLE"
            } else {
                "UNAVAILABLE"
            };
            out.push_str(&format!(
                "  {} {} connections={} weight={}\n",
                backend.address(),
                state,
                backend.active_connections(),
                backend.weight,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn config() -> ProxyConfig {
        ProxyConfig {
            backends: vec![BackendConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                weight: 1,
            }],
            ..ProxyConfig::default()
        }
    }

    #[tokio::test]
    async fn double_start_is_refused() {
        let mut cfg = config();
        cfg.server.port = 0;
        cfg.health_check.enabled = false;
        let controller = LifecycleController::new(cfg).unwrap();
        controller.start().await.unwrap();
        assert!(controller.start().await.is_err());
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_is_refused() {
        let mut cfg = config();
        cfg.health_check.enabled = false;
        let controller = LifecycleController::new(cfg).unwrap();
        assert!(controller.stop().await.is_err());
    }
}

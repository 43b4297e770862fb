pub mod runtime;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpSocket;
use tokio::sync::{Notify, Semaphore};

use crate::backend::BackendSet;
use crate::balance::SelectionPolicy;
use crate::error::ProxyError;
use crate::proxy;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const LISTEN_BACKLOG: u32 = 50;

/// Binds the listener and runs the accept loop until `shutdown` is notified.
///
/// Each accepted connection acquires a permit from a bounded semaphore sized
/// at `worker_pool_size` before its handler task is spawned — this caps
/// concurrency and provides backpressure once the pool saturates.
pub async fn run_acceptor(
    host: &str,
    port: u16,
    worker_pool_size: usize,
    backends: Arc<BackendSet>,
    policy: Arc<SelectionPolicy>,
    shutdown: Arc<Notify>,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| ProxyError::Bind(format!("invalid listen address {host}:{port}: {e}")))?;
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| ProxyError::Bind(format!("failed to create socket for {addr}: {e}")))?;
    socket
        .bind(addr)
        .map_err(|e| ProxyError::Bind(format!("failed to bind {addr}: {e}")))?;
    let listener = socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| ProxyError::Bind(format!("failed to listen on {addr}: {e}")))?;
    tracing::info!("proxy listening on {}", addr);

    let pool = Arc::new(Semaphore::new(worker_pool_size));
    let active_handlers = Arc::new(AtomicI64::new(0));

    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.notified() => {
                tracing::info!("acceptor: stop accepting new connections, draining...");
                break;
            }
        };

        let (stream, peer_addr) = match accepted {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("accept failed: {}", e);
                continue;
            }
        };

        let permit = pool.clone().acquire_owned().await?;
        active_handlers.fetch_add(1, Ordering::Relaxed);

        let backends = backends.clone();
        let policy = policy.clone();
        let active_handlers = active_handlers.clone();

        tokio::spawn(async move {
            proxy::handle_connection(stream, peer_addr, &backends, &policy).await;
            drop(permit);
            active_handlers.fetch_sub(1, Ordering::Relaxed);
        });
    }

    drain(&active_handlers).await;
    Ok(())
}

async fn drain(active_handlers: &Arc<AtomicI64>) {
    let wait = async {
        loop {
            if active_handlers.load(Ordering::Relaxed) <= 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };

    if tokio::time::timeout(DRAIN_TIMEOUT, wait).await.is_err() {
        tracing::warn!(
            "acceptor: drain timeout ({}s) reached, {} handlers still in flight, forcing termination",
            DRAIN_TIMEOUT.as_secs(),
            active_handlers.load(Ordering::Relaxed),
        );
    } else {
        tracing::info!("acceptor: all in-flight handlers drained");
    }
}

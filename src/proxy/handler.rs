use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::backend::{BackendSet, ConnectionGuard};
use crate::balance::SelectionPolicy;
use crate::error::ProxyError;
use crate::proxy::forwarder::{forward_message, MessageKind};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const BACKEND_READ_TIMEOUT: Duration = Duration::from_secs(30);
const SERVICE_UNAVAILABLE_BODY: &str = "Service Unavailable";

/// Handles one accepted client connection end-to-end: pick a backend, open
/// a connection to it, relay the request, relay the response, close both
/// sockets. Never propagates an error — every failure is logged and the
/// connection is closed.
pub async fn handle_connection(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    backends: &BackendSet,
    policy: &SelectionPolicy,
) {
    let available = backends.available();
    if available.is_empty() {
        tracing::debug!("{} for {}", ProxyError::NoBackend, peer_addr);
        write_service_unavailable(&mut client).await;
        return;
    }

    let backend = match policy.select(&available, &peer_addr.ip().to_string()) {
        Some(b) => b,
        None => {
            tracing::debug!("{} for {} (policy returned none)", ProxyError::NoBackend, peer_addr);
            write_service_unavailable(&mut client).await;
            return;
        }
    };

    // Guard's lifetime spans the whole relay so active_connections reflects
    // this request on every exit path, including the connect-failure return.
    let _guard = ConnectionGuard::new(backend.clone());
    let address = backend.address();

    let mut upstream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            tracing::warn!("{}", ProxyError::BackendConnect(format!("{address}: {e}")));
            return;
        }
        Err(_) => {
            tracing::warn!(
                "{}",
                ProxyError::BackendConnect(format!(
                    "{address}: timed out after {CONNECT_TIMEOUT:?}"
                ))
            );
            return;
        }
    };

    if let Err(e) = relay(&mut client, &mut upstream).await {
        tracing::debug!("relay for {} via {} ended: {}", peer_addr, address, e);
    }

    let _ = client.shutdown().await;
    let _ = upstream.shutdown().await;
}

async fn relay(client: &mut TcpStream, upstream: &mut TcpStream) -> std::io::Result<()> {
    forward_message(client, upstream, MessageKind::Request)
        .await
        .map_err(to_io_error)?;

    tokio::time::timeout(
        BACKEND_READ_TIMEOUT,
        forward_message(upstream, client, MessageKind::Response),
    )
    .await
    .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "backend read timed out"))?
    .map_err(to_io_error)?;

    Ok(())
}

fn to_io_error(e: crate::proxy::forwarder::ForwardError) -> std::io::Error {
    match e {
        crate::proxy::forwarder::ForwardError::Io(io) => io,
        crate::proxy::forwarder::ForwardError::MalformedChunkSize => {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed chunk size")
        }
    }
}

async fn write_service_unavailable(client: &mut TcpStream) {
    let response = format!(
        "HTTP/1.1 503 Service Unavailable\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        SERVICE_UNAVAILABLE_BODY.len(),
        SERVICE_UNAVAILABLE_BODY,
    );
    if let Err(e) = client.write_all(response.as_bytes()).await {
        tracing::debug!("failed writing 503 to client: {}", e);
    }
    let _ = client.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendSet;
    use crate::config::{Algorithm, BackendConfig};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn no_backends_yields_503() {
        let backends = BackendSet::new(vec![]);
        let policy = SelectionPolicy::new(Algorithm::RoundRobin);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_connection(stream, peer, &backends, &policy).await;
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        server.await.unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 503 Service Unavailable"));
        assert!(text.contains("Content-Length: 19"));
        assert!(text.ends_with("Service Unavailable"));
    }

    #[tokio::test]
    async fn unavailable_backend_is_excluded_from_selection() {
        let backends = BackendSet::new(vec![BackendConfig {
            host: "127.0.0.1".to_string(),
            port: 9,
            weight: 1,
        }]);
        backends.all()[0].set_available(false);
        let policy = SelectionPolicy::new(Algorithm::RoundRobin);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_connection(stream, peer, &backends, &policy).await;
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        server.await.unwrap();

        assert!(String::from_utf8(buf).unwrap().starts_with("HTTP/1.1 503"));
    }
}

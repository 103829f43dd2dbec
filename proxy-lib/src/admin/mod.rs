//! Admin Endpoint (C6): a second mTLS listener exposing the read/write
//! control plane described in spec section 4.6. TLS on this listener
//! requires and verifies a client certificate on every handshake -- see
//! `tls::build_admin_acceptor`; this is a distinct trust posture from the
//! proxy front end and the two must never share an acceptor.

mod response;
mod routes;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::error::{ProxyError, Result};
use crate::identity;
use crate::store::Store;

struct ConnectionGuard {
    count: Arc<AtomicUsize>,
    notify: watch::Sender<()>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::Relaxed) == 1 {
            let _ = self.notify.send(());
        }
    }
}

/// Runs the admin listener until a SIGTERM/SIGINT is received, then waits
/// (bounded by `shutdown_timeout`) for in-flight requests to finish.
pub async fn run(listen_port: u16, tls_acceptor: TlsAcceptor, store: Arc<Store>, shutdown_timeout: Duration) -> Result<()> {
    let addr: std::net::SocketAddr = format!("0.0.0.0:{listen_port}")
        .parse()
        .map_err(|e| ProxyError::Config(format!("invalid admin listen address: {e}")))?;
    let listener = TcpListener::bind(addr).await.map_err(ProxyError::Io)?;
    let builder = ConnBuilder::new(TokioExecutor::new());

    let active = Arc::new(AtomicUsize::new(0));
    let (closed_tx, mut closed_rx) = watch::channel(());

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| ProxyError::Io(std::io::Error::other(format!("failed to install SIGTERM handler: {e}"))))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| ProxyError::Io(std::io::Error::other(format!("failed to install SIGINT handler: {e}"))))?;

    info!(%addr, "starting admin listener");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("admin listener received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("admin listener received SIGINT, shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "admin accept error");
                        continue;
                    }
                };

                active.fetch_add(1, Ordering::Relaxed);
                let guard = ConnectionGuard { count: active.clone(), notify: closed_tx.clone() };
                let tls_acceptor = tls_acceptor.clone();
                let builder = builder.clone();
                let store = store.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    let tls_stream = match tls_acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(%peer, error = %e, "admin tls handshake failed");
                            return;
                        }
                    };

                    let peer_certs = tls_stream.get_ref().1.peer_certificates().map(|c| c.to_vec()).unwrap_or_default();
                    let caller = identity::verify_peer(&peer_certs).map(|id| id.common_name).unwrap_or_default();

                    let svc = hyper::service::service_fn(move |req| {
                        let store = store.clone();
                        let caller = caller.clone();
                        async move {
                            let _ = &caller;
                            let resp = routes::dispatch(req, store).await;
                            Ok::<_, hyper::Error>(resp)
                        }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(tls_stream), svc).await {
                        warn!(%peer, error = %e, "admin connection error");
                    }
                });
            }
        }
    }

    let deadline = Instant::now() + shutdown_timeout;
    tokio::select! {
        _ = closed_rx.changed() => {
            info!("admin listener: all connections closed");
        }
        _ = tokio::time::sleep_until(deadline) => {
            let remaining = active.load(Ordering::Relaxed);
            if remaining > 0 {
                warn!(remaining, "admin listener shutdown timeout reached with connections still active");
            }
        }
    }

    Ok(())
}


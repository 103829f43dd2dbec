//! Proxy Front End (C7): the primary mTLS listener. TLS on this listener
//! requests a client certificate but does not require one at the
//! handshake level -- see `tls::build_proxy_acceptor`; this is a distinct,
//! deliberately weaker trust posture than the admin listener and the two
//! acceptors must never be unified (spec section 9).

mod connect;
mod dispatch;
mod forward;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use rustls_pki_types::CertificateDer;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::config::{ProxyFrontConfig, ServerConfig};
use crate::error::{ProxyError, Result};
use crate::identity;
use crate::stats::collector::StatsHandle;
use crate::store::Store;
use crate::tunnel;

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

/// Runs the proxy front end listener until a SIGTERM/SIGINT is received,
/// then waits (bounded by `shutdown_timeout`) for in-flight tunnels and
/// requests to finish.
pub async fn run(
    server_cfg: Arc<ServerConfig>,
    front_cfg: Arc<ProxyFrontConfig>,
    tls_acceptor: TlsAcceptor,
    store: Arc<Store>,
    stats: StatsHandle,
    shutdown_timeout: Duration,
) -> Result<()> {
    let listener = TcpListener::bind(server_cfg.listen).await.map_err(ProxyError::Io)?;
    let builder = ConnBuilder::new(TokioExecutor::new());

    let active = Arc::new(AtomicUsize::new(0));
    let (closed_tx, mut closed_rx) = watch::channel(());

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| ProxyError::Io(std::io::Error::other(format!("failed to install SIGTERM handler: {e}"))))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| ProxyError::Io(std::io::Error::other(format!("failed to install SIGINT handler: {e}"))))?;

    info!(addr = %server_cfg.listen, "starting proxy front end");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("proxy listener received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("proxy listener received SIGINT, shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "proxy accept error");
                        continue;
                    }
                };
                if let Some(max) = server_cfg.max_connections {
                    if active.load(Ordering::Relaxed) >= max {
                        warn!(%peer, max, "connection limit reached, rejecting");
                        drop(stream);
                        continue;
                    }
                }

                tunnel::handler::tune_socket(&stream, &server_cfg, "client");

                active.fetch_add(1, Ordering::Relaxed);
                let guard = ConnectionGuard { count: active.clone(), notify: closed_tx.clone() };
                let tls_acceptor = tls_acceptor.clone();
                let builder = builder.clone();
                let server_cfg = server_cfg.clone();
                let front_cfg = front_cfg.clone();
                let store = store.clone();
                let stats = stats.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    let tls_stream = match tls_acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            warn!(%peer, error = %e, "proxy tls handshake failed");
                            return;
                        }
                    };

                    if let Err(e) = handle_connection(tls_stream, server_cfg, front_cfg, store, stats, &builder).await {
                        warn!(%peer, error = %e, "proxy connection error");
                    }
                });
            }
        }
    }

    let deadline = Instant::now() + shutdown_timeout;
    tokio::select! {
        _ = closed_rx.changed() => {
            info!("proxy listener: all connections closed");
        }
        _ = tokio::time::sleep_until(deadline) => {
            let remaining = active.load(Ordering::Relaxed);
            if remaining > 0 {
                warn!(remaining, "proxy listener shutdown timeout reached with connections still active");
            }
        }
    }

    Ok(())
}

fn peer_certs_of(tls_stream: &TlsStream<tokio::net::TcpStream>) -> Arc<[CertificateDer<'static>]> {
    tls_stream
        .get_ref()
        .1
        .peer_certificates()
        .map(|certs| certs.to_vec().into())
        .unwrap_or_else(|| Arc::from(Vec::new()))
}

async fn handle_connection(
    tls_stream: TlsStream<tokio::net::TcpStream>,
    server_cfg: Arc<ServerConfig>,
    front_cfg: Arc<ProxyFrontConfig>,
    store: Arc<Store>,
    stats: StatsHandle,
    builder: &ConnBuilder<TokioExecutor>,
) -> std::io::Result<()> {
    let peer_certs = peer_certs_of(&tls_stream);

    match connect::peek_request(tls_stream).await? {
        connect::Peeked::Eof => Ok(()),
        connect::Peeked::Connect { target, mut stream } => {
            let identity = identity::verify_peer(&peer_certs);
            let Some(peer) = identity else {
                write_raw_response(&mut stream, 405, "Method Not Allowed", "Client certificate required").await;
                return Ok(());
            };

            let disabled = store.is_user_disabled(&peer.common_name).await.unwrap_or_else(|e| {
                warn!(error = %e, user = %peer.common_name, "failed to check disabled flag, treating as enabled");
                false
            });
            if disabled {
                write_raw_response(&mut stream, 403, "Forbidden", "Access denied: Your account has been disabled").await;
                return Ok(());
            }

            tunnel::run_tunnel(stream, peer.common_name, target, &server_cfg, stats).await;
            Ok(())
        }
        connect::Peeked::Other { prefix, stream } => {
            let prefixed = connect::PrefixedStream::new(prefix, stream);
            let svc = hyper::service::service_fn(move |req| {
                let peer_certs = peer_certs.clone();
                let front_cfg = front_cfg.clone();
                let store = store.clone();
                async move { dispatch::handle_request(req, peer_certs, front_cfg, store).await }
            });
            builder
                .serve_connection(TokioIo::new(prefixed), svc)
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))
        }
    }
}

async fn write_raw_response<S: tokio::io::AsyncWrite + Unpin>(stream: &mut S, status: u16, reason: &str, body: &str) {
    let response =
        format!("HTTP/1.0 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}", body.len());
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

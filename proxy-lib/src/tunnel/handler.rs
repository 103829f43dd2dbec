//! Tunnel Handler (C3): dials the CONNECT target, confirms the tunnel to
//! the client, and pipes bytes in both directions until either side
//! closes. Implements the state machine from spec section 4.3:
//! New -> Dialing -> Piping -> Closed (or Failed on a dial error).

use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::stats::collector::StatsHandle;
use crate::stats::event::TrafficEvent;
use crate::tunnel::counters::{ByteCounter, CountingWriter};
use crate::tunnel::target::{parse_host_port, resolve_and_connect};

const CONNECT_ESTABLISHED: &[u8] = b"HTTP/1.0 200 Connection established\r\n\r\n";
const CONNECT_BAD_GATEWAY: &[u8] = b"HTTP/1.0 502 Bad Gateway\r\n\r\n";

/// Runs one CONNECT tunnel end to end on the hijacked client stream.
/// `user` is the peer identity's common name (possibly empty); `target`
/// is the raw CONNECT authority (`host:port`). Emits exactly one
/// [`TrafficEvent`] when the tunnel closes, successfully or not, as long
/// as a byte was ever exchanged with the upstream.
pub async fn run_tunnel<C>(mut client: C, user: String, target: String, cfg: &ServerConfig, stats: StatsHandle)
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (host, port) = parse_host_port(&target);
    let domain = host.clone();
    let connect_timeout = Duration::from_secs(cfg.connect_timeout_secs.max(1));

    let dial_result = tokio::time::timeout(connect_timeout, resolve_and_connect(&host, port)).await;

    let (upstream, destination) = match dial_result {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            warn!(%user, %domain, error = %e, "failed to dial connect target");
            let _ = write_all_and_flush(&mut client, CONNECT_BAD_GATEWAY).await;
            return;
        }
        Err(_) => {
            warn!(%user, %domain, timeout_secs = cfg.connect_timeout_secs, "connect target dial timed out");
            let _ = write_all_and_flush(&mut client, CONNECT_BAD_GATEWAY).await;
            return;
        }
    };

    tune_socket(&upstream, cfg, "upstream");

    if write_all_and_flush(&mut client, CONNECT_ESTABLISHED).await.is_err() {
        return;
    }

    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);

    let upload_counter = ByteCounter::new();
    let download_counter = ByteCounter::new();
    let buffer_size = cfg.buffer_size.max(1024);

    let upload_task = tokio::spawn(pump(client_read, upstream_write, buffer_size, upload_counter.clone()));
    let _ = pump(upstream_read, client_write, buffer_size, download_counter.clone()).await;
    let _ = upload_task.await;

    let upload_bytes = upload_counter.get();
    let download_bytes = download_counter.get();

    info!(%user, %domain, upload_bytes, download_bytes, "tunnel closed");

    stats.record(TrafficEvent {
        user,
        domain,
        destination_ip: Some(destination.ip()),
        upload_bytes,
        download_bytes,
        timestamp: chrono::Utc::now(),
        country: None,
    });
}

/// Copies `reader` into `writer` until EOF, tallying every byte the
/// writer half actually accepts through a [`CountingWriter`] (spec
/// section 4.2: counters wrap the stream, they do not tally independently
/// of what was actually transferred). Shuts down `writer` on EOF so a
/// half-close on this direction propagates to the peer and unblocks the
/// other direction's read (spec section 4.3 step 7).
async fn pump<R, W>(mut reader: R, writer: W, buffer_size: usize, counter: ByteCounter) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut counting_writer = CountingWriter::new(writer, counter);
    tokio::io::copy_buf(&mut tokio::io::BufReader::with_capacity(buffer_size, &mut reader), &mut counting_writer).await?;
    counting_writer.shutdown().await
}

async fn write_all_and_flush<C: AsyncWrite + Unpin>(stream: &mut C, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes).await?;
    stream.flush().await
}

/// Applies the configured Nagle/keepalive/buffer-size knobs to a raw TCP
/// socket. Spec section 4.3 step 4 requires this on *both* legs of a
/// tunnel -- the dialed upstream socket (called from this module) and the
/// accepted client socket, before its TLS handshake even starts (called
/// from `proxy::run`).
pub(crate) fn tune_socket(stream: &TcpStream, cfg: &ServerConfig, role: &str) {
    let sock = SockRef::from(stream);
    if let Err(e) = sock.set_nodelay(cfg.no_delay) {
        warn!(error = %e, role, "failed to set TCP_NODELAY on socket");
    }
    let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(cfg.tcp_keep_alive.max(1)));
    if let Err(e) = sock.set_tcp_keepalive(&keepalive) {
        warn!(error = %e, role, "failed to configure keepalive on socket");
    }
    if let Err(e) = sock.set_recv_buffer_size(cfg.read_buffer_size) {
        warn!(error = %e, role, "failed to set receive buffer size on socket");
    }
    if let Err(e) = sock.set_send_buffer_size(cfg.write_buffer_size) {
        warn!(error = %e, role, "failed to set send buffer size on socket");
    }
}

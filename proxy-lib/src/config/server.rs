use serde::Deserialize;
use std::net::SocketAddr;

/// The primary mTLS listener: address, certificate material, and the
/// socket/copy tuning knobs used by the CONNECT tunnel handler.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address and port to listen on for proxy CONNECT traffic.
    /// Default: "0.0.0.0:8443" (see `default_port`).
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Path to the server TLS certificate (PEM, full chain).
    pub cert_path: String,
    /// Path to the server TLS private key (PEM).
    pub key_path: String,
    /// Path to the trusted CA bundle (PEM) used to validate client certificates.
    pub ca_path: String,
    /// Per-direction byte-copy buffer size in bytes. Two buffers are
    /// allocated per tunnel (client->server and server->client); they
    /// never share storage since both directions run concurrently.
    /// Default: 65536 (64 KiB).
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// TCP keep-alive interval in seconds applied to both the client and
    /// upstream sockets. Default: 30.
    #[serde(default = "default_tcp_keep_alive")]
    pub tcp_keep_alive: u64,
    /// Socket read buffer size (`SO_RCVBUF`) in bytes. Default: 131072 (128 KiB).
    #[serde(default = "default_socket_buffer")]
    pub read_buffer_size: usize,
    /// Socket write buffer size (`SO_SNDBUF`) in bytes. Default: 131072 (128 KiB).
    #[serde(default = "default_socket_buffer")]
    pub write_buffer_size: usize,
    /// Disable Nagle's algorithm (`TCP_NODELAY`) on both sockets. Default: true.
    #[serde(default = "default_true")]
    pub no_delay: bool,
    /// Enable the (externally supplied) compression wrapper in front of the
    /// tunnel. This crate does not implement compression itself -- the field
    /// exists so deployments carrying the wrapper can still express the
    /// setting in one config file. Default: false.
    #[serde(default)]
    pub enable_compression: bool,
    /// Upstream TCP connect timeout in seconds. Default: 30.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Optional cap on simultaneously active tunnels. `None` means unbounded.
    #[serde(default)]
    pub max_connections: Option<usize>,
}

fn default_listen() -> SocketAddr {
    "0.0.0.0:8443".parse().expect("valid default listen address")
}

fn default_buffer_size() -> usize {
    64 * 1024
}

fn default_tcp_keep_alive() -> u64 {
    30
}

fn default_socket_buffer() -> usize {
    128 * 1024
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    30
}

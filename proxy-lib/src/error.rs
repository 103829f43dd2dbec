use thiserror::Error;

/// Errors that can occur anywhere in the proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Statistics store error: {0}")]
    Store(String),

    #[error("No private key found in key file")]
    NoPrivateKey,

    #[error("No trust anchors found in CA file")]
    NoTrustAnchors,

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("Failed to forward request: {0}")]
    Forward(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

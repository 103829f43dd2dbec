use std::sync::Arc;

use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::error::{ProxyError, Result};

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let bytes = std::fs::read(path)
        .map_err(|e| ProxyError::Tls(format!("failed to read certificate {path}: {e}")))?;
    CertificateDer::pem_slice_iter(&bytes)
        .collect::<std::result::Result<Vec<_>, rustls_pki_types::pem::Error>>()
        .map_err(|e| ProxyError::Tls(format!("failed to parse certificates {path}: {e}")))
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let bytes = std::fs::read(path)
        .map_err(|e| ProxyError::Tls(format!("failed to read private key {path}: {e}")))?;
    let mut keys: Vec<PrivateKeyDer<'_>> = PrivateKeyDer::pem_slice_iter(&bytes)
        .collect::<std::result::Result<Vec<_>, rustls_pki_types::pem::Error>>()
        .map_err(|e| ProxyError::Tls(format!("failed to parse private key {path}: {e}")))?;
    keys.pop().ok_or(ProxyError::NoPrivateKey)
}

fn load_roots(path: &str) -> Result<RootCertStore> {
    let certs = load_certs(path)?;
    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| ProxyError::Tls(format!("failed to add trust anchor: {e}")))?;
    }
    if roots.is_empty() {
        return Err(ProxyError::NoTrustAnchors);
    }
    Ok(roots)
}

/// Builds the proxy front end's TLS acceptor: client certificates are
/// *requested* but not required, so the handshake succeeds even for
/// unauthenticated probes (spec section 4.7 / section 9).
pub fn build_proxy_acceptor(
    cert_path: &str,
    key_path: &str,
    ca_path: &str,
) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;
    let roots = Arc::new(load_roots(ca_path)?);

    let verifier = WebPkiClientVerifier::builder(roots)
        .allow_unauthenticated()
        .build()
        .map_err(|e| ProxyError::Tls(format!("failed to build client verifier: {e}")))?;

    let server_config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(|e| ProxyError::Tls(format!("failed to build tls config: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Builds the admin endpoint's TLS acceptor: client certificates are
/// required and verified against the trust root on every handshake (spec
/// section 4.6). Do not reuse `build_proxy_acceptor` here -- the two
/// policies must never be unified (spec section 9).
pub fn build_admin_acceptor(
    cert_path: &str,
    key_path: &str,
    ca_path: &str,
) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;
    let roots = Arc::new(load_roots(ca_path)?);

    let verifier = WebPkiClientVerifier::builder(roots)
        .build()
        .map_err(|e| ProxyError::Tls(format!("failed to build client verifier: {e}")))?;

    let server_config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(|e| ProxyError::Tls(format!("failed to build tls config: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

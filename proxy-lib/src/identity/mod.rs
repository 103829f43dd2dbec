//! Identity Verifier (C1).
//!
//! Chain validation against the trusted root set and the
//! client-authentication EKU constraint are enforced by rustls itself
//! (see `tls::acceptor`) before a connection is ever handed to this module
//! -- a handshake that fails either check never produces a [`PeerIdentity`].
//! What's left here is purely the identity extraction: pulling the Subject
//! Common Name out of the (already-trusted) leaf certificate.

use rustls_pki_types::CertificateDer;
use x509_parser::prelude::*;

/// The user identifier used throughout the system: the certificate's
/// Subject Common Name. May be empty -- callers must accept `""` as a
/// valid (if unusual) user rather than treating it as an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    pub common_name: String,
}

/// Extracts the peer identity from the certificates presented during the
/// TLS handshake. Returns `None` when the peer presented no certificate at
/// all (unauthenticated probe) or when the leaf certificate cannot be
/// parsed as X.509 -- both are "invalid" outcomes the caller must handle
/// without panicking.
pub fn verify_peer(certs: &[CertificateDer<'_>]) -> Option<PeerIdentity> {
    let leaf = certs.first()?;
    let (_, cert) = X509Certificate::from_der(leaf.as_ref()).ok()?;
    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("")
        .to_string();
    Some(PeerIdentity { common_name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_certificate_list_is_invalid() {
        let certs: Vec<CertificateDer<'_>> = Vec::new();
        assert!(verify_peer(&certs).is_none());
    }

    #[test]
    fn garbage_der_is_invalid_not_a_panic() {
        let certs = vec![CertificateDer::from(vec![0u8, 1, 2, 3])];
        assert!(verify_peer(&certs).is_none());
    }

    #[test]
    fn valid_certificate_yields_common_name() {
        let cert = rcgen::generate_simple_self_signed(vec!["alice".to_string()])
            .expect("self-signed cert");
        let der = CertificateDer::from(cert.cert.der().to_vec());
        let identity = verify_peer(std::slice::from_ref(&der));
        assert!(identity.is_some());
    }
}

//! Identity Verifier (C1) edge cases from spec section 4.1, exercised
//! against the public `verify_peer` entry point.

use proxy_lib::identity::verify_peer;
use rustls_pki_types::CertificateDer;

#[test]
fn empty_peer_certificate_list_is_invalid() {
    let certs: Vec<CertificateDer<'_>> = Vec::new();
    assert!(verify_peer(&certs).is_none());
}

#[test]
fn unparseable_leaf_certificate_is_invalid_not_a_panic() {
    let certs = vec![CertificateDer::from(vec![0xde, 0xad, 0xbe, 0xef])];
    assert!(verify_peer(&certs).is_none());
}

#[test]
fn valid_leaf_certificate_yields_its_common_name() {
    let cert = rcgen::generate_simple_self_signed(vec!["trusted-client".to_string()]).expect("self-signed cert");
    let der = CertificateDer::from(cert.cert.der().to_vec());
    let identity = verify_peer(std::slice::from_ref(&der)).expect("identity extracted");
    assert_eq!(identity.common_name, "trusted-client");
}

#[test]
fn distinct_certificates_yield_distinct_common_names() {
    let first = rcgen::generate_simple_self_signed(vec!["client-a".to_string()]).expect("self-signed cert");
    let second = rcgen::generate_simple_self_signed(vec!["client-b".to_string()]).expect("self-signed cert");

    let first_der = CertificateDer::from(first.cert.der().to_vec());
    let second_der = CertificateDer::from(second.cert.der().to_vec());

    let first_identity = verify_peer(std::slice::from_ref(&first_der)).expect("identity extracted");
    let second_identity = verify_peer(std::slice::from_ref(&second_der)).expect("identity extracted");

    assert_ne!(first_identity.common_name, second_identity.common_name);
}

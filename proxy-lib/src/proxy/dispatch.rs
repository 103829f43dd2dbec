//! Proxy Front End request dispatch for everything that is *not* a
//! CONNECT (C7, spec section 4.7 steps 2, 3, 5, 6). CONNECT requests
//! never reach this module -- `proxy::connect` intercepts them on the raw
//! stream before hyper is involved, so the byte-exact tunnel-established
//! response is never mixed with a hyper-generated one.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use rustls_pki_types::CertificateDer;
use tracing::{info, warn};

use crate::config::ProxyFrontConfig;
use crate::identity;
use crate::proxy::forward::{forward_to_default_site, RespBody};
use crate::store::Store;

fn text_response(status: StatusCode, body: &'static str) -> Response<RespBody> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from_static(body.as_bytes())).map_err(|never| match never {}).boxed())
        .expect("valid response")
}

/// Handles one non-CONNECT request. `peer_certs` is whatever the TLS
/// handshake produced for this connection -- empty when the client
/// presented none, since the listener requests but never requires one.
pub async fn handle_request(
    req: Request<Incoming>,
    peer_certs: Arc<[CertificateDer<'static>]>,
    front_cfg: Arc<ProxyFrontConfig>,
    store: Arc<Store>,
) -> Result<Response<RespBody>, hyper::Error> {
    let identity = identity::verify_peer(&peer_certs);

    let Some(peer) = identity else {
        // Step 2 / 6: no usable identity, decoy forward.
        return Ok(forward_or_bad_gateway(req, &front_cfg.default_site).await);
    };

    // Step 3: disabled users are rejected regardless of method.
    let disabled = store.is_user_disabled(&peer.common_name).await.unwrap_or_else(|e| {
        warn!(error = %e, user = %peer.common_name, "failed to check disabled flag, treating as enabled");
        false
    });
    if disabled {
        return Ok(text_response(StatusCode::FORBIDDEN, "Access denied: Your account has been disabled"));
    }

    // Step 5: valid, enabled, non-CONNECT -> count the request, then decoy forward.
    if let Err(e) = store.increment_request_count(&peer.common_name).await {
        warn!(error = %e, user = %peer.common_name, "failed to increment request counter");
    }
    info!(user = %peer.common_name, "authenticated non-connect request, forwarding to default site");
    Ok(forward_or_bad_gateway(req, &front_cfg.default_site).await)
}

async fn forward_or_bad_gateway(req: Request<Incoming>, default_site: &str) -> Response<RespBody> {
    match forward_to_default_site(req, default_site).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, "failed to forward request to default site");
            text_response(StatusCode::BAD_GATEWAY, "default site unreachable")
        }
    }
}

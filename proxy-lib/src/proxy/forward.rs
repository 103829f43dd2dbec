//! Default-site decoy forwarding (spec section 4.7 steps 2, 5, 6). Every
//! non-CONNECT request that does not result in a tunnel -- unauthenticated,
//! invalid-certificate, or simply a non-CONNECT method -- lands here
//! instead of being rejected, giving probes a landing page to talk to.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::{ProxyError, Result};

pub type RespBody = BoxBody<Bytes, hyper::Error>;

/// Forwards `req` to `default_site`, appending the incoming path and query
/// verbatim and copying every header through unchanged (spec section 9:
/// tests assert headers and URI are forwarded verbatim).
pub async fn forward_to_default_site(req: Request<Incoming>, default_site: &str) -> Result<Response<RespBody>> {
    let path_and_query = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/").to_string();
    let uri: http::Uri = format!("{default_site}{path_and_query}").parse()?;

    let (mut parts, body) = req.into_parts();
    parts.uri = uri;
    let out_req = Request::from_parts(parts, body);

    let client: Client<HttpConnector, Incoming> = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    let resp = client
        .request(out_req)
        .await
        .map_err(|e| ProxyError::Forward(e.to_string()))?;

    let (parts, body) = resp.into_parts();
    Ok(Response::from_parts(parts, body.boxed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_join_keeps_path_and_query() {
        let default_site = "http://127.0.0.1:1";
        let joined = format!("{default_site}{}", "/foo?bar=1");
        assert_eq!(joined, "http://127.0.0.1:1/foo?bar=1");
    }
}

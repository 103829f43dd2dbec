//! The uniform `{success, data, error}` envelope every admin read/write
//! endpoint returns (spec section 4.6).

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn body_from(bytes: Vec<u8>) -> RespBody {
    Full::new(Bytes::from(bytes)).map_err(|never| match never {}).boxed()
}

pub fn ok<T: Serialize>(data: T) -> Response<RespBody> {
    let envelope = Envelope { success: true, data: Some(data), error: None };
    let payload = serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{\"success\":false}".to_vec());
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(body_from(payload))
        .expect("valid response")
}

pub fn err(status: StatusCode, message: impl Into<String>) -> Response<RespBody> {
    let envelope: Envelope<()> = Envelope { success: false, data: None, error: Some(message.into()) };
    let payload = serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{\"success\":false}".to_vec());
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body_from(payload))
        .expect("valid response")
}

pub fn not_found(message: impl Into<String>) -> Response<RespBody> {
    err(StatusCode::NOT_FOUND, message)
}

pub fn service_unavailable(message: impl Into<String>) -> Response<RespBody> {
    err(StatusCode::SERVICE_UNAVAILABLE, message)
}

pub fn bad_request(message: impl Into<String>) -> Response<RespBody> {
    err(StatusCode::BAD_REQUEST, message)
}

pub fn method_not_allowed() -> Response<RespBody> {
    err(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

//! Route dispatch for the admin JSON API (spec section 4.6).

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use tracing::warn;

use super::response::{self, RespBody};
use crate::store::{Store, TrendRange};

pub async fn dispatch(req: Request<Incoming>, store: Arc<Store>) -> Response<RespBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method.clone(), segments.as_slice()) {
        (Method::GET, ["overview"]) => overview(&store).await,
        (Method::GET, ["users"]) => all_users(&store).await,
        (Method::GET, ["users", name]) => single_user(&store, name).await,
        (Method::GET, ["domains"]) => top_domains(&store, &query).await,
        (Method::GET, ["trends"]) => trends(&store, &query).await,
        (Method::GET, ["countries"]) => countries(&store).await,
        (Method::POST, ["user", name, "disable"]) => set_disabled(&store, name, true).await,
        (Method::POST, ["user", name, "enable"]) => set_disabled(&store, name, false).await,
        (Method::GET | Method::POST, _) => response::not_found("no such admin endpoint"),
        _ => response::method_not_allowed(),
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let k = parts.next()?;
        let v = parts.next().unwrap_or("");
        (k == key).then_some(v)
    })
}

async fn overview(store: &Store) -> Response<RespBody> {
    match store.overview().await {
        Ok(snapshot) => {
            let avg_bytes_per_connection = snapshot.avg_bytes_per_connection();
            response::ok(serde_json::json!({
                "total_upload_bytes": snapshot.total_upload_bytes,
                "total_download_bytes": snapshot.total_download_bytes,
                "total_connection_count": snapshot.total_connection_count,
                "user_count": snapshot.user_count,
                "domain_count": snapshot.domain_count,
                "country_count": snapshot.country_count,
                "avg_bytes_per_connection": avg_bytes_per_connection,
            }))
        }
        Err(e) => {
            warn!(error = %e, "overview query failed");
            response::service_unavailable("stats store unavailable")
        }
    }
}

async fn all_users(store: &Store) -> Response<RespBody> {
    match store.all_users().await {
        Ok(users) => response::ok(users),
        Err(e) => {
            warn!(error = %e, "users query failed");
            response::service_unavailable("stats store unavailable")
        }
    }
}

async fn single_user(store: &Store, name: &str) -> Response<RespBody> {
    match store.user(name).await {
        Ok(Some(user)) => response::ok(user),
        Ok(None) => response::not_found(format!("no such user: {name}")),
        Err(e) => {
            warn!(error = %e, %name, "user query failed");
            response::service_unavailable("stats store unavailable")
        }
    }
}

async fn top_domains(store: &Store, query: &str) -> Response<RespBody> {
    let user = query_param(query, "user");
    let limit = query_param(query, "limit").and_then(|v| v.parse::<i64>().ok()).unwrap_or(50);

    match store.top_domains(user, limit).await {
        Ok(domains) => response::ok(domains),
        Err(e) => {
            warn!(error = %e, "domains query failed");
            response::service_unavailable("stats store unavailable")
        }
    }
}

async fn trends(store: &Store, query: &str) -> Response<RespBody> {
    let range_param = query_param(query, "range").unwrap_or("1h");
    let range = match TrendRange::parse(range_param) {
        Some(r) => r,
        None => return response::bad_request(format!("unknown range: {range_param}")),
    };

    match store.trends(range).await {
        Ok(points) => response::ok(points),
        Err(e) => {
            warn!(error = %e, "trends query failed");
            response::service_unavailable("stats store unavailable")
        }
    }
}

async fn countries(store: &Store) -> Response<RespBody> {
    match store.countries().await {
        Ok(countries) => response::ok(countries),
        Err(e) => {
            warn!(error = %e, "countries query failed");
            response::service_unavailable("stats store unavailable")
        }
    }
}

async fn set_disabled(store: &Store, name: &str, disabled: bool) -> Response<RespBody> {
    match store.set_user_disabled(name, disabled).await {
        Ok(()) => response::ok(serde_json::json!({ "user": name, "disabled": disabled })),
        Err(e) => {
            warn!(error = %e, %name, "set_user_disabled failed");
            response::service_unavailable("stats store unavailable")
        }
    }
}

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::engine::datasource::ReadQuery;
use crate::engine::matcher::MatchStrategy;
use crate::engine::pipeline;
use crate::state::SharedState;

/// `/v1` mount: strict UUID id segments, no CRUD shorthand.
pub async fn serve_legacy(
    State(state): State<SharedState>,
    Path(path): Path<String>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve(state, MatchStrategy::Legacy, method, path, raw_query, headers, body).await
}

/// `/v2` mount: opaque id segments, CRUD endpoints enabled.
pub async fn serve_extended(
    State(state): State<SharedState>,
    Path(path): Path<String>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    serve(state, MatchStrategy::Extended, method, path, raw_query, headers, body).await
}

async fn serve(
    state: SharedState,
    strategy: MatchStrategy,
    method: Method,
    path: String,
    raw_query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Preflight succeeds for any path, even ones that match nothing.
    if method == Method::OPTIONS {
        return preflight();
    }

    let path = format!("/{path}");
    let query = parse_query(raw_query.as_deref());

    let mut resp =
        match pipeline::handle(&state, strategy, &method, &path, query, &headers, body).await {
            Ok(resp) => resp,
            Err(e) => e.into_response(),
        };
    apply_cors(&mut resp);
    resp
}

fn parse_query(raw: Option<&str>) -> ReadQuery {
    let mut query = ReadQuery::default();
    let Some(raw) = raw else { return query };
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "page" => query.page = value.parse().ok(),
            "limit" => query.limit = value.parse().ok(),
            _ => {}
        }
    }
    query
}

fn apply_cors(resp: &mut Response) {
    let headers = resp.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert("access-control-max-age", HeaderValue::from_static("86400"));
}

fn preflight() -> Response {
    let mut resp = StatusCode::OK.into_response();
    apply_cors(&mut resp);
    resp
}

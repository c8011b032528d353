use std::time::Duration;

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Account, Endpoint, MockRecord, Project, StoredFile};
use crate::state::SharedState;

use super::cache::{self, CachedResponse};
use super::datasource::{self, ReadQuery};
use super::matcher::MatchStrategy;
use super::quota::{self, DailyVerdict};
use super::{auth_gate, body, schema};

/// Per-request control flow, shared by both serve mounts:
/// match -> daily quota -> rate limit -> auth -> branch by method.
/// Every stage can short-circuit to a terminal HTTP response.
pub async fn handle(
    state: &SharedState,
    strategy: MatchStrategy,
    method: &Method,
    path: &str,
    query: ReadQuery,
    headers: &HeaderMap,
    payload: Bytes,
) -> Result<Response, EngineError> {
    let route = state
        .index
        .resolve(path, method.as_str(), strategy)
        .await?
        .ok_or_else(|| EngineError::EndpointNotFound {
            path: path.to_string(),
            method: method.to_string(),
        })?;
    let project = route.project;
    let endpoint = route.endpoint;
    let resource_id = route.resource_id;

    // Quota checks fail open: availability beats strict enforcement.
    let account = match state.store.find_account(project.owner_user_id).await {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!("Account lookup failed, allowing request: {e}");
            None
        }
    };

    if let Some(account) = &account {
        // Daily exhaustion is checked before the rate limiter so rejected
        // requests do not burn rate-limit state.
        match quota::check_daily(state.store.as_ref(), account, Utc::now()).await {
            Ok(DailyVerdict::Allowed) => {}
            Ok(DailyVerdict::Rejected {
                used,
                limit,
                notify,
                renewal,
            }) => {
                if notify {
                    dispatch_limit_notification(state, account, used, limit, renewal);
                }
                return Err(EngineError::DailyLimitExceeded { used, limit });
            }
            Err(e) => tracing::warn!("Daily quota check failed, allowing request: {e}"),
        }

        if let Err(wait_ms) = state.rate_limiter.check(account.id, account.tier) {
            return Err(EngineError::RateLimited(format!(
                "Too many requests. Retry after {wait_ms}ms"
            )));
        }
    }

    auth_gate::check(&project, &endpoint, headers)?;

    let source_id = datasource::effective_data_source(&endpoint, strategy);

    let is_create = *method == Method::POST
        && (!endpoint.fields.is_empty() || (endpoint.is_crud && strategy.supports_crud()));

    if is_create {
        return create(state, &project, &endpoint, account.as_ref(), headers, payload).await;
    }

    if let Some(source_id) = source_id {
        if *method == Method::GET {
            return read(
                state,
                &project,
                &endpoint,
                strategy,
                source_id,
                account.as_ref(),
                resource_id.as_deref(),
                path,
                query,
            )
            .await;
        }
        if *method == Method::DELETE {
            return delete(
                state,
                &project,
                &endpoint,
                source_id,
                account.as_ref(),
                resource_id.as_deref(),
            )
            .await;
        }
        if *method == Method::PUT || *method == Method::PATCH {
            return update(
                state,
                &project,
                &endpoint,
                source_id,
                account.as_ref(),
                resource_id.as_deref(),
                *method == Method::PUT,
                headers,
                payload,
            )
            .await;
        }
    }

    Ok(static_fallback(&endpoint, account.as_ref()))
}

async fn create(
    state: &SharedState,
    project: &Project,
    endpoint: &Endpoint,
    account: Option<&Account>,
    headers: &HeaderMap,
    payload: Bytes,
) -> Result<Response, EngineError> {
    let parsed = body::parse(headers, payload, &endpoint.fields, state.blob.as_ref()).await?;

    let validation = schema::validate(&endpoint.fields, &parsed.body, true);
    if !validation.is_valid {
        return Err(EngineError::ValidationFailed(validation.errors));
    }

    let data_size = json_size(&parsed.body);
    let incoming = data_size + parsed.aux_files_size as i64;
    if let Some(account) = account {
        if quota::check_storage(account, incoming).is_err() {
            dispatch_storage_notification(state, account);
            return Err(EngineError::StorageLimitExceeded);
        }
    }

    let record = MockRecord::new(endpoint.id, project.id, parsed.body, parsed.uploaded_files);
    state.store.insert_record(&record).await?;

    if let Some(account) = account {
        if let Err(e) = state.store.adjust_storage_usage(account.id, incoming).await {
            tracing::warn!("Storage usage update failed: {e}");
        }
    }

    invalidate_cache(state, project.id, endpoint.id);

    Ok(json_response(
        StatusCode::CREATED,
        json!({ "message": "Created", "data": record.data, "id": record.id }),
    ))
}

#[allow(clippy::too_many_arguments)]
async fn read(
    state: &SharedState,
    project: &Project,
    endpoint: &Endpoint,
    strategy: MatchStrategy,
    source_id: Uuid,
    account: Option<&Account>,
    resource_id: Option<&str>,
    path: &str,
    query: ReadQuery,
) -> Result<Response, EngineError> {
    let read_only = account.is_some_and(Account::storage_exceeded);

    let key = cache::response_key(
        project.id,
        source_id,
        path,
        endpoint.data_source_mode,
        &endpoint.data_source_fields,
        endpoint.aggregator.as_deref(),
        query,
    );

    if let Some(hit) = state.cache.get(&key).await {
        let status = StatusCode::from_u16(hit.status).unwrap_or(StatusCode::OK);
        let mut resp = json_response(status, hit.body);
        if read_only {
            mark_read_only(&mut resp);
        }
        return Ok(resp);
    }

    let value = datasource::resolve_read(
        state.store.as_ref(),
        project,
        endpoint,
        strategy,
        resource_id,
        query,
    )
    .await?;

    // Fire-and-forget: the response never blocks on cache maintenance.
    let cache_handle = state.cache.clone();
    let ttl = Duration::from_secs(state.config.cache_ttl_secs);
    let entry = CachedResponse {
        status: 200,
        body: value.clone(),
    };
    tokio::spawn(async move {
        cache_handle.set(key, entry, ttl).await;
    });

    let mut resp = json_response(StatusCode::OK, value);
    if read_only {
        mark_read_only(&mut resp);
    }
    Ok(resp)
}

async fn delete(
    state: &SharedState,
    project: &Project,
    endpoint: &Endpoint,
    source_id: Uuid,
    account: Option<&Account>,
    resource_id: Option<&str>,
) -> Result<Response, EngineError> {
    let targets = datasource::resolve_targets(
        state.store.as_ref(),
        project,
        endpoint,
        source_id,
        resource_id,
    )
    .await?;

    let mut deleted = Vec::with_capacity(targets.len());
    let mut freed: i64 = 0;
    for target in &targets {
        state.store.delete_record(target.id).await?;
        freed += target.data_size();
        deleted.push(target.expanded());
    }

    if let Some(account) = account {
        if let Err(e) = state.store.adjust_storage_usage(account.id, -freed).await {
            tracing::warn!("Storage usage update failed: {e}");
        }
    }

    invalidate_cache(state, project.id, source_id);

    Ok(json_response(
        StatusCode::OK,
        json!({ "message": "Deleted", "deletedData": single_or_many(deleted) }),
    ))
}

#[allow(clippy::too_many_arguments)]
async fn update(
    state: &SharedState,
    project: &Project,
    endpoint: &Endpoint,
    source_id: Uuid,
    account: Option<&Account>,
    resource_id: Option<&str>,
    replace: bool,
    headers: &HeaderMap,
    payload: Bytes,
) -> Result<Response, EngineError> {
    let targets = datasource::resolve_targets(
        state.store.as_ref(),
        project,
        endpoint,
        source_id,
        resource_id,
    )
    .await?;

    let parsed = body::parse(headers, payload, &endpoint.fields, state.blob.as_ref()).await?;

    // PATCH merges partial bodies; only PUT demands every required field.
    let validation = schema::validate(&endpoint.fields, &parsed.body, replace);
    if !validation.is_valid {
        return Err(EngineError::ValidationFailed(validation.errors));
    }

    let mut staged: Vec<(Uuid, Value, Vec<StoredFile>)> = Vec::with_capacity(targets.len());
    let mut delta: i64 = parsed.aux_files_size as i64;
    for target in &targets {
        let merged = merge(&target.data, &parsed.body);
        delta += json_size(&merged) - target.data_size();
        let files = merge_files(&target.files, &parsed.uploaded_files);
        staged.push((target.id, merged, files));
    }

    if let Some(account) = account {
        if delta > 0 && quota::check_storage(account, delta).is_err() {
            dispatch_storage_notification(state, account);
            return Err(EngineError::StorageLimitExceeded);
        }
    }

    let now = Utc::now();
    let mut updated = Vec::with_capacity(staged.len());
    for (id, merged, files) in staged {
        state.store.update_record(id, &merged, &files, now).await?;
        let mut expanded = merged;
        if let Some(obj) = expanded.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.to_string()));
        }
        updated.push(expanded);
    }

    if let Some(account) = account {
        if let Err(e) = state.store.adjust_storage_usage(account.id, delta).await {
            tracing::warn!("Storage usage update failed: {e}");
        }
    }

    invalidate_cache(state, project.id, source_id);

    Ok(json_response(
        StatusCode::OK,
        json!({ "message": "Updated", "updatedData": single_or_many(updated) }),
    ))
}

/// Static endpoints return their configured body verbatim: JSON when it
/// parses, text/plain otherwise.
fn static_fallback(endpoint: &Endpoint, account: Option<&Account>) -> Response {
    let status = StatusCode::from_u16(endpoint.status_code).unwrap_or(StatusCode::OK);

    let mut resp = match serde_json::from_str::<Value>(&endpoint.response_body) {
        Ok(value) => json_response(status, value),
        Err(_) => (
            status,
            [("content-type", "text/plain; charset=utf-8")],
            endpoint.response_body.clone(),
        )
            .into_response(),
    };

    if account.is_some_and(Account::storage_exceeded) {
        mark_read_only(&mut resp);
    }
    resp
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Informational marker attached to reads while the storage budget is
/// exceeded.
fn mark_read_only(resp: &mut Response) {
    resp.headers_mut()
        .insert("x-read-only-mode", HeaderValue::from_static("true"));
}

fn json_size(value: &Value) -> i64 {
    serde_json::to_vec(value).map(|v| v.len() as i64).unwrap_or(0)
}

fn single_or_many(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.pop().expect("one value")
    } else {
        Value::Array(values)
    }
}

/// Shallow merge: incoming keys win; non-object payloads replace wholesale.
fn merge(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => new.clone(),
    }
}

fn merge_files(old: &[StoredFile], new: &[StoredFile]) -> Vec<StoredFile> {
    let mut merged: Vec<StoredFile> = old
        .iter()
        .filter(|f| !new.iter().any(|n| n.field_name == f.field_name))
        .cloned()
        .collect();
    merged.extend(new.iter().cloned());
    merged
}

fn invalidate_cache(state: &SharedState, project_id: Uuid, source_id: Uuid) {
    let cache = state.cache.clone();
    let prefix = cache::invalidation_prefix(project_id, source_id);
    tokio::spawn(async move {
        cache.del_prefix(&prefix).await;
    });
}

fn dispatch_limit_notification(
    state: &SharedState,
    account: &Account,
    used: i64,
    limit: i64,
    renewal: chrono::DateTime<Utc>,
) {
    let store = state.store.clone();
    let notifier = state.notifier.clone();
    let id = account.id;
    let email = account.email.clone();
    let tier = account.tier;
    tokio::spawn(async move {
        if let Err(e) = store.mark_request_limit_email_sent(id, Utc::now()).await {
            tracing::warn!("Failed to mark limit email sent: {e}");
        }
        if let Err(e) = notifier
            .send_limit_exceeded(&email, tier.as_str(), used, limit, renewal)
            .await
        {
            tracing::warn!("Limit notification failed: {e}");
        }
    });
}

fn dispatch_storage_notification(state: &SharedState, account: &Account) {
    let now = Utc::now();
    let due = account
        .last_storage_limit_email_sent
        .is_none_or(|at| now - at >= chrono::Duration::hours(24));
    if !due {
        return;
    }

    let store = state.store.clone();
    let notifier = state.notifier.clone();
    let id = account.id;
    let email = account.email.clone();
    let tier = account.tier;
    let used = account.storage_usage_bytes;
    let limit = account.tier.storage_limit_bytes();
    tokio::spawn(async move {
        if let Err(e) = store.mark_storage_limit_email_sent(id, now).await {
            tracing::warn!("Failed to mark storage email sent: {e}");
        }
        if let Err(e) = notifier
            .send_limit_exceeded(&email, tier.as_str(), used, limit, now + chrono::Duration::hours(24))
            .await
        {
            tracing::warn!("Storage notification failed: {e}");
        }
    });
}

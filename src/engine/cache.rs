use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::models::DataSourceMode;

use super::datasource::ReadQuery;

/// A cached terminal response for a data-backed GET.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Value,
}

/// Read-through response cache. Writes and pattern invalidation are
/// dispatched fire-and-forget; a cache failure never fails a request.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedResponse>;
    async fn set(&self, key: String, value: CachedResponse, ttl: Duration);
    async fn del_prefix(&self, prefix: &str);
}

/// Key layout: `project:endpoint:path:mode:sortedFields:aggregator:page:limit`.
/// `endpoint` is the data-source endpoint, so that a write to the source
/// invalidates every GET variant reading from it. The pagination knobs are
/// part of the key because each page is a distinct response body.
pub fn response_key(
    project_id: Uuid,
    source_endpoint_id: Uuid,
    path: &str,
    mode: DataSourceMode,
    fields: &[String],
    aggregator: Option<&str>,
    query: ReadQuery,
) -> String {
    let mut sorted: Vec<&str> = fields.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!(
        "{project_id}:{source_endpoint_id}:{path}:{}:{}:{}:{}:{}",
        mode.as_str(),
        sorted.join(","),
        aggregator.unwrap_or("-"),
        query.page.map_or_else(|| "-".to_string(), |p| p.to_string()),
        query.limit.map_or_else(|| "-".to_string(), |l| l.to_string()),
    )
}

pub fn invalidation_prefix(project_id: Uuid, source_endpoint_id: Uuid) -> String {
    format!("{project_id}:{source_endpoint_id}:")
}

/// In-process cache with lazy expiry on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (CachedResponse, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Called periodically from the janitor task.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, deadline)| *deadline > now);
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (value, deadline) = entry.value();
                if Instant::now() < *deadline {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: String, value: CachedResponse, ttl: Duration) {
        self.entries.insert(key, (value, Instant::now() + ttl));
    }

    async fn del_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }
}

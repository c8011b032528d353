pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Account, MockRecord, Project, StoredFile};

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The document store behind the engine. Projects and endpoints are
/// read-only input (authored by the out-of-scope dashboard); quota state
/// and mock records are the only things the engine writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All projects in creation order. Feeds the endpoint index.
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Start a fresh 24h window: clear all counters, stamp the reset time.
    async fn reset_daily_window(&self, account_id: Uuid, reset_at: DateTime<Utc>)
        -> StoreResult<()>;

    /// Atomically add one to the counter under `window_key`; returns the
    /// new count. Atomic at the storage layer so concurrent requests
    /// cannot under-count.
    async fn increment_daily_count(&self, account_id: Uuid, window_key: &str) -> StoreResult<i64>;

    async fn touch_last_request(&self, account_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn mark_request_limit_email_sent(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn mark_storage_limit_email_sent(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Adjust storage usage by `delta_bytes` (may be negative); clamped at zero.
    async fn adjust_storage_usage(&self, account_id: Uuid, delta_bytes: i64) -> StoreResult<()>;

    async fn insert_record(&self, record: &MockRecord) -> StoreResult<()>;

    async fn find_record(
        &self,
        endpoint_id: Uuid,
        project_id: Uuid,
        id: Uuid,
    ) -> StoreResult<Option<MockRecord>>;

    /// All records for an endpoint, most recent first.
    async fn list_records(&self, endpoint_id: Uuid, project_id: Uuid)
        -> StoreResult<Vec<MockRecord>>;

    async fn update_record(
        &self,
        id: Uuid,
        data: &Value,
        files: &[StoredFile],
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn delete_record(&self, id: Uuid) -> StoreResult<()>;
}

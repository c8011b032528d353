use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Account, MockRecord, Project, StoredFile};

use super::{DocumentStore, StoreError, StoreResult};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Projects keep their endpoint list and auth settings as JSONB, the same
/// way the dashboard wrote them.
#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    base_url: String,
    authentication: Value,
    endpoints: Value,
    owner_user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl ProjectRow {
    fn into_project(self) -> StoreResult<Project> {
        Ok(Project {
            id: self.id,
            name: self.name,
            base_url: self.base_url,
            authentication: serde_json::from_value(self.authentication)
                .map_err(|e| StoreError(format!("Bad authentication JSON: {e}")))?,
            endpoints: serde_json::from_value(self.endpoints)
                .map_err(|e| StoreError(format!("Bad endpoints JSON: {e}")))?,
            owner_user_id: self.owner_user_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    tier: String,
    storage_usage_bytes: i64,
    last_request_at: Option<DateTime<Utc>>,
    last_request_reset: DateTime<Utc>,
    daily_request_counts: Value,
    last_request_limit_email_sent: Option<DateTime<Utc>>,
    last_storage_limit_email_sent: Option<DateTime<Utc>>,
}

impl AccountRow {
    fn into_account(self) -> StoreResult<Account> {
        Ok(Account {
            id: self.id,
            email: self.email,
            tier: serde_json::from_value(Value::String(self.tier))
                .map_err(|e| StoreError(format!("Bad account tier: {e}")))?,
            storage_usage_bytes: self.storage_usage_bytes,
            last_request_at: self.last_request_at,
            last_request_reset: self.last_request_reset,
            daily_request_counts: serde_json::from_value(self.daily_request_counts)
                .map_err(|e| StoreError(format!("Bad daily counts JSON: {e}")))?,
            last_request_limit_email_sent: self.last_request_limit_email_sent,
            last_storage_limit_email_sent: self.last_storage_limit_email_sent,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    endpoint_id: Uuid,
    project_id: Uuid,
    data: Value,
    files: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> StoreResult<MockRecord> {
        Ok(MockRecord {
            id: self.id,
            endpoint_id: self.endpoint_id,
            project_id: self.project_id,
            data: self.data,
            files: serde_json::from_value(self.files)
                .map_err(|e| StoreError(format!("Bad files JSON: {e}")))?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT * FROM projects ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProjectRow::into_project).collect()
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AccountRow::into_account).transpose()
    }

    async fn reset_daily_window(
        &self,
        account_id: Uuid,
        reset_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE accounts SET daily_request_counts = '{}'::jsonb, last_request_reset = $2
             WHERE id = $1",
        )
        .bind(account_id)
        .bind(reset_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_daily_count(&self, account_id: Uuid, window_key: &str) -> StoreResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "UPDATE accounts
             SET daily_request_counts = jsonb_set(
                 daily_request_counts,
                 ARRAY[$2],
                 to_jsonb(COALESCE((daily_request_counts->>$2)::bigint, 0) + 1))
             WHERE id = $1
             RETURNING (daily_request_counts->>$2)::bigint",
        )
        .bind(account_id)
        .bind(window_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn touch_last_request(&self, account_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET last_request_at = $2 WHERE id = $1")
            .bind(account_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_request_limit_email_sent(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET last_request_limit_email_sent = $2 WHERE id = $1")
            .bind(account_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_storage_limit_email_sent(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET last_storage_limit_email_sent = $2 WHERE id = $1")
            .bind(account_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn adjust_storage_usage(&self, account_id: Uuid, delta_bytes: i64) -> StoreResult<()> {
        sqlx::query(
            "UPDATE accounts SET storage_usage_bytes = GREATEST(storage_usage_bytes + $2, 0)
             WHERE id = $1",
        )
        .bind(account_id)
        .bind(delta_bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_record(&self, record: &MockRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO mock_records (id, endpoint_id, project_id, data, files, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.endpoint_id)
        .bind(record.project_id)
        .bind(&record.data)
        .bind(serde_json::to_value(&record.files).unwrap_or(Value::Array(vec![])))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_record(
        &self,
        endpoint_id: Uuid,
        project_id: Uuid,
        id: Uuid,
    ) -> StoreResult<Option<MockRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM mock_records WHERE id = $1 AND endpoint_id = $2 AND project_id = $3",
        )
        .bind(id)
        .bind(endpoint_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn list_records(
        &self,
        endpoint_id: Uuid,
        project_id: Uuid,
    ) -> StoreResult<Vec<MockRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT * FROM mock_records WHERE endpoint_id = $1 AND project_id = $2
             ORDER BY created_at DESC",
        )
        .bind(endpoint_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn update_record(
        &self,
        id: Uuid,
        data: &Value,
        files: &[StoredFile],
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE mock_records SET data = $2, files = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(data)
        .bind(serde_json::to_value(files).unwrap_or(Value::Array(vec![])))
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM mock_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

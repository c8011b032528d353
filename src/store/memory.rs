use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Account, MockRecord, Project, StoredFile};

use super::{DocumentStore, StoreError, StoreResult};

/// DashMap-backed store. Used by the integration tests and by deployments
/// that run without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    projects: DashMap<Uuid, Project>,
    accounts: DashMap<Uuid, Account>,
    records: DashMap<Uuid, MockRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&self, project: Project) {
        self.projects.insert(project.id, project);
    }

    pub fn insert_account(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    pub fn seed_record(&self, record: MockRecord) {
        self.records.insert(record.id, record);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> =
            self.projects.iter().map(|entry| entry.value().clone()).collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.get(&id).map(|entry| entry.value().clone()))
    }

    async fn reset_daily_window(
        &self,
        account_id: Uuid,
        reset_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(mut account) = self.accounts.get_mut(&account_id) {
            account.daily_request_counts.clear();
            account.last_request_reset = reset_at;
        }
        Ok(())
    }

    async fn increment_daily_count(&self, account_id: Uuid, window_key: &str) -> StoreResult<i64> {
        let mut account = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError(format!("Account not found: {account_id}")))?;
        let count = account
            .daily_request_counts
            .entry(window_key.to_string())
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn touch_last_request(&self, account_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(mut account) = self.accounts.get_mut(&account_id) {
            account.last_request_at = Some(at);
        }
        Ok(())
    }

    async fn mark_request_limit_email_sent(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(mut account) = self.accounts.get_mut(&account_id) {
            account.last_request_limit_email_sent = Some(at);
        }
        Ok(())
    }

    async fn mark_storage_limit_email_sent(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(mut account) = self.accounts.get_mut(&account_id) {
            account.last_storage_limit_email_sent = Some(at);
        }
        Ok(())
    }

    async fn adjust_storage_usage(&self, account_id: Uuid, delta_bytes: i64) -> StoreResult<()> {
        if let Some(mut account) = self.accounts.get_mut(&account_id) {
            account.storage_usage_bytes = (account.storage_usage_bytes + delta_bytes).max(0);
        }
        Ok(())
    }

    async fn insert_record(&self, record: &MockRecord) -> StoreResult<()> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_record(
        &self,
        endpoint_id: Uuid,
        project_id: Uuid,
        id: Uuid,
    ) -> StoreResult<Option<MockRecord>> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| r.endpoint_id == endpoint_id && r.project_id == project_id)
            .map(|r| r.value().clone()))
    }

    async fn list_records(
        &self,
        endpoint_id: Uuid,
        project_id: Uuid,
    ) -> StoreResult<Vec<MockRecord>> {
        let mut records: Vec<MockRecord> = self
            .records
            .iter()
            .filter(|r| r.endpoint_id == endpoint_id && r.project_id == project_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn update_record(
        &self,
        id: Uuid,
        data: &Value,
        files: &[StoredFile],
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError(format!("Record not found: {id}")))?;
        record.data = data.clone();
        record.files = files.to_vec();
        record.updated_at = updated_at;
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> StoreResult<()> {
        self.records.remove(&id);
        Ok(())
    }
}

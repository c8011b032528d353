use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A persisted record behind a data-backed endpoint. Lifetime is
/// independent of the project/endpoint definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRecord {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub project_id: Uuid,
    pub data: Value,
    #[serde(default)]
    pub files: Vec<StoredFile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub field_name: String,
    pub url: String,
}

impl MockRecord {
    pub fn new(endpoint_id: Uuid, project_id: Uuid, data: Value, files: Vec<StoredFile>) -> Self {
        let now = Utc::now();
        MockRecord {
            id: Uuid::now_v7(),
            endpoint_id,
            project_id,
            data,
            files,
            created_at: now,
            updated_at: now,
        }
    }

    /// Response shape for reads: the stored payload with the record id
    /// spliced in. Non-object payloads are wrapped under `data`.
    pub fn expanded(&self) -> Value {
        let mut obj = match &self.data {
            Value::Object(m) => m.clone(),
            other => {
                let mut m = Map::new();
                m.insert("data".to_string(), other.clone());
                m
            }
        };
        obj.insert("id".to_string(), Value::String(self.id.to_string()));
        Value::Object(obj)
    }

    /// Byte size of the persisted payload, used by the storage accountant.
    pub fn data_size(&self) -> i64 {
        serde_json::to_vec(&self.data).map(|v| v.len() as i64).unwrap_or(0)
    }
}

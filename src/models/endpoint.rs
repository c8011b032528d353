use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::FieldSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: Uuid,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub response_body: String,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub requires_auth: Option<bool>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub data_source: Option<Uuid>,
    #[serde(default)]
    pub data_source_mode: DataSourceMode,
    #[serde(default)]
    pub data_source_fields: Vec<String>,
    #[serde(default)]
    pub aggregator: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub pagination: Option<PaginationSettings>,
    #[serde(default)]
    pub is_crud: bool,
}

fn default_status_code() -> u16 {
    200
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceMode {
    #[default]
    Full,
    Field,
    Aggregator,
}

impl DataSourceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DataSourceMode::Full => "full",
            DataSourceMode::Field => "field",
            DataSourceMode::Aggregator => "aggregator",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

/// One leaf of a flat AND-conjunction filter. No OR, no nesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
}

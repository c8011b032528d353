use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user quota state. Mutated only by the quota guard and the storage
/// accountant; everything else treats it as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub tier: AccountTier,
    #[serde(default)]
    pub storage_usage_bytes: i64,
    #[serde(default)]
    pub last_request_at: Option<DateTime<Utc>>,
    pub last_request_reset: DateTime<Utc>,
    /// Sparse map keyed by the ISO timestamp of the current 24h window's
    /// start; cleared wholesale when a new window begins.
    #[serde(default)]
    pub daily_request_counts: BTreeMap<String, i64>,
    #[serde(default)]
    pub last_request_limit_email_sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_storage_limit_email_sent: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountTier {
    #[default]
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "plus", alias = "freemium")]
    Plus,
    #[serde(rename = "pro")]
    Pro,
    #[serde(rename = "ultra-pro")]
    UltraPro,
}

impl AccountTier {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountTier::Free => "free",
            AccountTier::Plus => "plus",
            AccountTier::Pro => "pro",
            AccountTier::UltraPro => "ultra-pro",
        }
    }

    pub fn requests_per_second(self) -> u64 {
        match self {
            AccountTier::Free => 5,
            AccountTier::Plus => 20,
            AccountTier::Pro => 100,
            AccountTier::UltraPro => 500,
        }
    }

    /// Minimum interval between two requests from the same account.
    pub fn min_interval_ms(self) -> u64 {
        1000 / self.requests_per_second()
    }

    pub fn daily_request_limit(self) -> i64 {
        match self {
            AccountTier::Free => 300,
            AccountTier::Plus => 3_000,
            AccountTier::Pro => 20_000,
            AccountTier::UltraPro => 200_000,
        }
    }

    pub fn storage_limit_bytes(self) -> i64 {
        match self {
            AccountTier::Free => 10 * 1024 * 1024,
            AccountTier::Plus => 100 * 1024 * 1024,
            AccountTier::Pro => 1024 * 1024 * 1024,
            AccountTier::UltraPro => 10 * 1024 * 1024 * 1024,
        }
    }
}

impl Account {
    pub fn storage_exceeded(&self) -> bool {
        self.storage_usage_bytes >= self.tier.storage_limit_bytes()
    }
}

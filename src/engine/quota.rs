use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::models::{Account, AccountTier};
use crate::store::{DocumentStore, StoreResult};

/// Per-account minimum-inter-request-interval limiter, sliding on the
/// wall clock of the last allowed request.
pub struct RateLimiter {
    last_allowed: DashMap<Uuid, Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            last_allowed: DashMap::new(),
        }
    }

    /// Returns Err with the remaining wait in milliseconds when the
    /// request arrives before the tier's minimum interval has elapsed.
    pub fn check(&self, account_id: Uuid, tier: AccountTier) -> Result<(), u64> {
        let min_interval = Duration::from_millis(tier.min_interval_ms());
        let now = Instant::now();

        match self.last_allowed.entry(account_id) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.duration_since(*entry.get());
                if elapsed < min_interval {
                    return Err((min_interval - elapsed).as_millis().max(1) as u64);
                }
                entry.insert(now);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(())
            }
        }
    }

    /// Remove entries idle longer than `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.last_allowed
            .retain(|_, at| now.duration_since(*at) < max_age);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

pub enum DailyVerdict {
    Allowed,
    Rejected {
        used: i64,
        limit: i64,
        /// The at-most-once-per-24h notification is due.
        notify: bool,
        renewal: DateTime<Utc>,
    },
}

const WINDOW: chrono::Duration = chrono::Duration::hours(24);

/// Rolling 24h request-count check against the persisted account row.
/// The counter increment is atomic at the store; the window reset is a
/// read-then-write approximation, accepted per the concurrency model.
pub async fn check_daily(
    store: &dyn DocumentStore,
    account: &Account,
    now: DateTime<Utc>,
) -> StoreResult<DailyVerdict> {
    let limit = account.tier.daily_request_limit();

    let (window_start, current) = if now - account.last_request_reset >= WINDOW {
        store.reset_daily_window(account.id, now).await?;
        (now, 0)
    } else {
        let key = account.last_request_reset.to_rfc3339();
        let current = account.daily_request_counts.get(&key).copied().unwrap_or(0);
        (account.last_request_reset, current)
    };

    if current >= limit {
        let notify = account
            .last_request_limit_email_sent
            .is_none_or(|at| now - at >= WINDOW);
        return Ok(DailyVerdict::Rejected {
            used: current,
            limit,
            notify,
            renewal: window_start + WINDOW,
        });
    }

    store
        .increment_daily_count(account.id, &window_start.to_rfc3339())
        .await?;
    store.touch_last_request(account.id, now).await?;
    Ok(DailyVerdict::Allowed)
}

/// Byte-budget check for a write of `incoming_bytes`. Returns the
/// (used, limit) pair on rejection.
pub fn check_storage(account: &Account, incoming_bytes: i64) -> Result<(), (i64, i64)> {
    let limit = account.tier.storage_limit_bytes();
    if account.storage_usage_bytes + incoming_bytes > limit {
        return Err((account.storage_usage_bytes, limit));
    }
    Ok(())
}

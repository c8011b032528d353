use std::sync::Arc;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::engine::cache::ResponseCache;
use crate::engine::matcher::EndpointIndex;
use crate::engine::quota::RateLimiter;
use crate::notify::LimitNotifier;
use crate::store::DocumentStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<dyn ResponseCache>,
    pub blob: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn LimitNotifier>,
    pub index: EndpointIndex,
    pub rate_limiter: RateLimiter,
}

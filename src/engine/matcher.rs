use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use tokio::sync::RwLock;

use crate::error::EngineError;
use crate::models::{Endpoint, Project};
use crate::store::DocumentStore;

/// The two serve mounts differ only in their ID-segment format and whether
/// self-referential CRUD endpoints are honored; everything downstream is
/// one pipeline parameterized by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// `/v1` — strict hyphenated-UUID resource IDs, no CRUD self-reference.
    Legacy,
    /// `/v2` — opaque alphanumeric resource IDs, CRUD endpoints resolve
    /// their own collection.
    Extended,
}

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid segment regex")
});

static OPAQUE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("opaque segment regex"));

impl MatchStrategy {
    pub fn is_id_segment(self, segment: &str) -> bool {
        match self {
            MatchStrategy::Legacy => UUID_SEGMENT.is_match(segment),
            MatchStrategy::Extended => OPAQUE_SEGMENT.is_match(segment),
        }
    }

    pub fn supports_crud(self) -> bool {
        matches!(self, MatchStrategy::Extended)
    }
}

/// A resolved `(project, endpoint)` pair plus the optional trailing
/// resource-ID segment.
#[derive(Clone)]
pub struct ResolvedRoute {
    pub project: Arc<Project>,
    pub endpoint: Endpoint,
    pub resource_id: Option<String>,
}

struct IndexSnapshot {
    built_at: Option<Instant>,
    by_slug: HashMap<String, Vec<Arc<Project>>>,
}

/// Slug-keyed project index so resolution is a hash lookup instead of a
/// full table scan per request. Rebuilt when the snapshot goes stale.
/// Within one slug bucket, creation order is preserved: slug collisions
/// resolve to the first matching project, same as the scan did.
pub struct EndpointIndex {
    store: Arc<dyn DocumentStore>,
    ttl: Duration,
    snapshot: RwLock<IndexSnapshot>,
}

impl EndpointIndex {
    pub fn new(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            snapshot: RwLock::new(IndexSnapshot {
                built_at: None,
                by_slug: HashMap::new(),
            }),
        }
    }

    async fn refresh_if_stale(&self) -> Result<(), EngineError> {
        {
            let snap = self.snapshot.read().await;
            if snap
                .built_at
                .is_some_and(|at| at.elapsed() < self.ttl && !self.ttl.is_zero())
            {
                return Ok(());
            }
        }

        let projects = self.store.list_projects().await?;
        let now = Utc::now();
        let mut by_slug: HashMap<String, Vec<Arc<Project>>> = HashMap::new();
        for project in projects {
            if project.is_expired(now) {
                continue;
            }
            by_slug
                .entry(project.slug())
                .or_default()
                .push(Arc::new(project));
        }

        let mut snap = self.snapshot.write().await;
        snap.built_at = Some(Instant::now());
        snap.by_slug = by_slug;
        Ok(())
    }

    /// Resolve a raw path (`/{slug}/{rest...}`) and method to the first
    /// matching endpoint. Iteration is declaration order; ambiguous
    /// overlapping definitions resolve by first-match, not best-match.
    pub async fn resolve(
        &self,
        path: &str,
        method: &str,
        strategy: MatchStrategy,
    ) -> Result<Option<ResolvedRoute>, EngineError> {
        self.refresh_if_stale().await?;

        let trimmed = path.trim_start_matches('/');
        let (slug, rest) = match trimmed.split_once('/') {
            Some((slug, rest)) => (slug, format!("/{rest}")),
            None => (trimmed, "/".to_string()),
        };

        let snap = self.snapshot.read().await;
        let Some(projects) = snap.by_slug.get(slug) else {
            return Ok(None);
        };

        for project in projects {
            for endpoint in &project.endpoints {
                if let Some(resource_id) =
                    match_endpoint(project, endpoint, method, &rest, strategy)
                {
                    return Ok(Some(ResolvedRoute {
                        project: project.clone(),
                        endpoint: endpoint.clone(),
                        resource_id,
                    }));
                }
            }
        }
        Ok(None)
    }
}

/// Returns `Some(optional_id)` on a match, `None` otherwise.
fn match_endpoint(
    project: &Project,
    endpoint: &Endpoint,
    method: &str,
    rest: &str,
    strategy: MatchStrategy,
) -> Option<Option<String>> {
    let expected = join_paths(&project.base_url, &endpoint.path);
    let rest = normalize_path(rest);

    let crud = endpoint.is_crud && strategy.supports_crud();
    if !crud && !endpoint.method.eq_ignore_ascii_case(method) {
        return None;
    }

    if rest == expected {
        return Some(None);
    }

    // Trailing opaque ID segment: item traffic for CRUD resources, or
    // ID-scoped reads/writes on GET/PUT/PATCH/DELETE.
    let id_methods = matches!(
        method.to_ascii_uppercase().as_str(),
        "GET" | "PUT" | "PATCH" | "DELETE"
    );
    if crud || id_methods {
        let prefix = format!("{expected}/");
        if let Some(segment) = rest.strip_prefix(&prefix) {
            if !segment.is_empty() && !segment.contains('/') && strategy.is_id_segment(segment) {
                return Some(Some(segment.to_string()));
            }
        }
    }

    None
}

/// Single leading slash, trailing slash stripped for comparison.
pub fn normalize_path(path: &str) -> String {
    let mut out = format!("/{}", path.trim_start_matches('/'));
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

pub fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_matches('/');
    let path = path.trim_matches('/');
    match (base.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("/{base}"),
        (false, false) => format!("/{base}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{AuthSettings, Project};

    use super::*;

    fn endpoint(path: &str, method: &str, is_crud: bool) -> Endpoint {
        Endpoint {
            id: Uuid::now_v7(),
            path: path.to_string(),
            method: method.to_string(),
            response_body: String::new(),
            status_code: 200,
            requires_auth: None,
            fields: vec![],
            data_source: None,
            data_source_mode: Default::default(),
            data_source_fields: vec![],
            aggregator: None,
            conditions: vec![],
            pagination: None,
            is_crud,
        }
    }

    fn project(name: &str, base_url: &str, endpoints: Vec<Endpoint>) -> Project {
        Project {
            id: Uuid::now_v7(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            authentication: AuthSettings::default(),
            endpoints,
            owner_user_id: Uuid::now_v7(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn join_and_normalize() {
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("", "users"), "/users");
        assert_eq!(join_paths("api", ""), "/api");
        assert_eq!(normalize_path("api/users/"), "/api/users");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn exact_match_any_method() {
        let p = project("Shop", "/api", vec![endpoint("/orders", "POST", false)]);
        let e = &p.endpoints[0];
        assert_eq!(
            match_endpoint(&p, e, "POST", "/api/orders", MatchStrategy::Extended),
            Some(None)
        );
        assert_eq!(
            match_endpoint(&p, e, "GET", "/api/orders", MatchStrategy::Extended),
            None
        );
    }

    #[test]
    fn trailing_id_segment_rules() {
        let p = project("Shop", "/api", vec![endpoint("/orders", "GET", false)]);
        let e = &p.endpoints[0];

        let uuid = "0198c2f0-0000-7000-8000-0123456789ab";
        assert_eq!(
            match_endpoint(&p, e, "GET", &format!("/api/orders/{uuid}"), MatchStrategy::Legacy),
            Some(Some(uuid.to_string()))
        );
        // Legacy mount only accepts strict UUID segments.
        assert_eq!(
            match_endpoint(&p, e, "GET", "/api/orders/abc123", MatchStrategy::Legacy),
            None
        );
        assert_eq!(
            match_endpoint(&p, e, "GET", "/api/orders/abc123", MatchStrategy::Extended),
            Some(Some("abc123".to_string()))
        );
        // Two extra segments never match.
        assert_eq!(
            match_endpoint(&p, e, "GET", "/api/orders/a/b", MatchStrategy::Extended),
            None
        );
    }

    #[test]
    fn crud_matches_regardless_of_method() {
        let p = project("Shop", "", vec![endpoint("/items", "GET", true)]);
        let e = &p.endpoints[0];
        assert_eq!(
            match_endpoint(&p, e, "POST", "/items", MatchStrategy::Extended),
            Some(None)
        );
        assert_eq!(
            match_endpoint(&p, e, "DELETE", "/items/xyz", MatchStrategy::Extended),
            Some(Some("xyz".to_string()))
        );
        // Legacy mount ignores the CRUD flag: method must match.
        assert_eq!(
            match_endpoint(&p, e, "POST", "/items", MatchStrategy::Legacy),
            None
        );
    }

    #[tokio::test]
    async fn first_match_wins_and_resolution_is_idempotent() {
        use crate::store::MemoryStore;

        let store = Arc::new(MemoryStore::new());
        // "My Shop" and "My-Shop" collide on the slug "my-shop".
        let mut first = project("My Shop", "/api", vec![endpoint("/items", "GET", false)]);
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        let second = project("My-Shop", "/api", vec![endpoint("/items", "GET", false)]);
        let first_id = first.id;
        store.insert_project(first);
        store.insert_project(second);

        let index = EndpointIndex::new(store, Duration::from_secs(60));
        for _ in 0..3 {
            let route = index
                .resolve("/my-shop/api/items", "GET", MatchStrategy::Extended)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(route.project.id, first_id);
        }

        assert!(index
            .resolve("/unknown/api/items", "GET", MatchStrategy::Extended)
            .await
            .unwrap()
            .is_none());
    }
}

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use mockwire::config::Config;
use mockwire::engine::cache::MemoryCache;
use mockwire::blob::MemoryBlobStore;
use mockwire::models::{Account, AccountTier, Endpoint, Project};
use mockwire::notify::NoopNotifier;
use mockwire::store::MemoryStore;

/// A running test server backed by an in-memory store the test can seed
/// and inspect directly.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get_text(&self, path: &str) -> (String, StatusCode, Option<String>) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.text().await.unwrap_or_default();
        (body, status, content_type)
    }

    pub async fn get_with_header(
        &self,
        path: &str,
        header: &str,
        value: &str,
    ) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .header(header, value)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn patch_json(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .expect("patch request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

/// Spawn the server on an ephemeral port with a fresh in-memory store.
/// The endpoint index TTL is zero so seeded projects are visible on the
/// very next request.
pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: "unused".to_string(),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_body_size: 10 * 1024 * 1024,
        cache_ttl_secs: 300,
        index_ttl_secs: 0,
        blob_url: None,
        log_level: "warn".to_string(),
        smtp: None,
    };

    let state = mockwire::build_state(
        config,
        store.clone(),
        Arc::new(MemoryCache::new()),
        Arc::new(MemoryBlobStore::new()),
        Arc::new(NoopNotifier),
    );
    let app = mockwire::build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    TestApp {
        addr,
        client: Client::new(),
        store,
    }
}

/// A project owned by a user with no quota account, so quota checks fail
/// open and stay out of the way.
pub fn project(name: &str, endpoints: Vec<Endpoint>) -> Project {
    Project {
        id: Uuid::now_v7(),
        name: name.to_string(),
        base_url: String::new(),
        authentication: Default::default(),
        endpoints,
        owner_user_id: Uuid::now_v7(),
        created_at: Utc::now(),
        expires_at: None,
    }
}

/// A bare endpoint fixture; tests set the fields they care about.
pub fn endpoint(path: &str, method: &str) -> Endpoint {
    Endpoint {
        id: Uuid::now_v7(),
        path: path.to_string(),
        method: method.to_string(),
        response_body: String::new(),
        status_code: 200,
        requires_auth: None,
        fields: Vec::new(),
        data_source: None,
        data_source_mode: Default::default(),
        data_source_fields: Vec::new(),
        aggregator: None,
        conditions: Vec::new(),
        pagination: None,
        is_crud: false,
    }
}

pub fn account(owner: Uuid, tier: AccountTier) -> Account {
    Account {
        id: owner,
        email: "owner@test.com".to_string(),
        tier,
        storage_usage_bytes: 0,
        last_request_at: None,
        last_request_reset: Utc::now(),
        daily_request_counts: Default::default(),
        last_request_limit_email_sent: None,
        last_storage_limit_email_sent: None,
    }
}

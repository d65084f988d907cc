#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use subreg_registry::SubdomainRegistry;
use subreg_session::{ApiClient, Credential, SessionEventBus, TokenStore};
use subreg_storage::{MemoryStorage, SecureStorage};
use url::Url;
use wiremock::MockServer;

pub const LIST: &str = "/api/v1/subdomains/";

pub struct Harness {
    pub server: MockServer,
    pub tokens: Arc<TokenStore>,
    pub registry: Arc<SubdomainRegistry>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new())).await
    }

    pub async fn with_storage(storage: Arc<dyn SecureStorage>) -> Self {
        let server = MockServer::start().await;
        let (tokens, registry) = registry_for(&server, storage);
        Self {
            server,
            tokens,
            registry,
        }
    }

    pub fn sign_in(&self) {
        self.tokens.set(&Credential::new("valid-token")).unwrap();
    }

    pub fn ids(&self) -> Vec<i64> {
        self.registry.list().iter().map(|s| s.id).collect()
    }

    /// Number of requests the server saw for `method path`.
    pub async fn hits(&self, method: &str, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == method && r.url.path() == path)
            .count()
    }
}

pub fn registry_for(
    server: &MockServer,
    storage: Arc<dyn SecureStorage>,
) -> (Arc<TokenStore>, Arc<SubdomainRegistry>) {
    let tokens = Arc::new(TokenStore::new(storage, SessionEventBus::new()));
    let api = ApiClient::new(Url::parse(&server.uri()).unwrap(), tokens.clone()).unwrap();
    (tokens, Arc::new(SubdomainRegistry::new(api)))
}

pub fn subdomain_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "subdomain": name,
        "target_domain": "example.github.io",
        "record_type": "CNAME",
        "ttl": 3600,
        "priority": null,
        "created_at": "2024-05-01T10:00:00",
        "updated_at": "2024-05-01T10:00:00"
    })
}

pub fn list_json(ids: &[i64]) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| subdomain_json(*id, &format!("site{}", id)))
            .collect(),
    )
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

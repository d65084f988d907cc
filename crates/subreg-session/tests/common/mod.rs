#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use subreg_session::{
    ApiClient, AuthSession, Credential, RecordingNavigator, SessionEventBus, TokenStore,
};
use subreg_storage::{MemoryStorage, SecureStorage};
use url::Url;
use wiremock::MockServer;

pub struct Harness {
    pub server: MockServer,
    pub tokens: Arc<TokenStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub session: Arc<AuthSession>,
}

pub async fn harness() -> Harness {
    harness_with_storage(Arc::new(MemoryStorage::new())).await
}

pub async fn harness_with_storage(storage: Arc<dyn SecureStorage>) -> Harness {
    let server = MockServer::start().await;
    let (tokens, navigator, session) = session_for(&server, storage);
    Harness {
        server,
        tokens,
        navigator,
        session,
    }
}

/// A session against `server` on its own event bus, as a second process would have.
pub fn session_for(
    server: &MockServer,
    storage: Arc<dyn SecureStorage>,
) -> (Arc<TokenStore>, Arc<RecordingNavigator>, Arc<AuthSession>) {
    let tokens = Arc::new(TokenStore::new(storage, SessionEventBus::new()));
    let api = ApiClient::new(Url::parse(&server.uri()).unwrap(), tokens.clone()).unwrap();
    let navigator = Arc::new(RecordingNavigator::new());
    let session = Arc::new(AuthSession::new(api, navigator.clone()));
    (tokens, navigator, session)
}

pub fn user_json(username: &str) -> serde_json::Value {
    json!({
        "id": "2f1c6a4e-8d7b-4c1a-9d1e-3b5f0a9c7e21",
        "github_id": 4242,
        "username": username,
        "email": format!("{}@example.com", username),
        "avatar_url": format!("https://avatars.example.com/{}", username),
    })
}

pub fn credential(token: &str) -> Credential {
    Credential::new(token)
}

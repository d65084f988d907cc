//! The one request pipeline every API call goes through.
//!
//! Outgoing: `Authorization: Bearer <token>` when a credential is held,
//! nothing otherwise. Incoming: 401 clears the credential that was sent
//! before the error reaches the caller; 422 bodies become [`FieldError`]s;
//! other failures carry the server's `detail` message.

use crate::error::{ApiError, ApiResult, FieldError};
use crate::events::ClearReason;
use crate::token_store::TokenStore;
use crate::types::{HealthStatus, LoginUrlResponse, User};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// API paths, relative to the configured base URL.
pub struct Endpoints;

impl Endpoints {
    pub const LOGIN_GITHUB: &'static str = "api/v1/auth/login/github";
    pub const ME: &'static str = "api/v1/auth/me";
    pub const SUBDOMAINS: &'static str = "api/v1/subdomains/";
    pub const HEALTHZ: &'static str = "api/v1/healthz";

    pub fn subdomain(id: i64) -> String {
        format!("api/v1/subdomains/{}", id)
    }
}

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    pub fn new(base_url: Url, tokens: Arc<TokenStore>) -> ApiResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url, tokens))
    }

    pub fn with_client(http: Client, mut base_url: Url, tokens: Arc<TokenStore>) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            tokens,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(self.http.get(self.url(path)?)).await?;
        decode(response).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self.send(self.http.post(self.url(path)?).json(body)).await?;
        decode(response).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self.send(self.http.put(self.url(path)?).json(body)).await?;
        decode(response).await
    }

    /// DELETE. Any 2xx counts, with or without a body.
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send(self.http.delete(self.url(path)?)).await?;
        Ok(())
    }

    /// Provider authorization URL to send the user to.
    pub async fn fetch_login_url(&self) -> ApiResult<Url> {
        let body: LoginUrlResponse = self.get(Endpoints::LOGIN_GITHUB).await?;
        Url::parse(&body.url).map_err(ApiError::from)
    }

    pub async fn fetch_profile(&self) -> ApiResult<User> {
        self.get(Endpoints::ME).await
    }

    pub async fn health(&self) -> ApiResult<HealthStatus> {
        self.get(Endpoints::HEALTHZ).await
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let credential = self.tokens.get()?;
        let request = match &credential {
            Some(credential) => request.bearer_auth(credential.expose()),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        debug!(status = %status, url = %response.url().path(), "API response");

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            match &credential {
                Some(sent) => {
                    if let Err(e) = self.tokens.invalidate(sent, ClearReason::SessionExpired) {
                        warn!(error = %e, "Failed to clear rejected credential");
                    }
                }
                None => debug!("Unauthenticated request rejected"),
            }
            return Err(ApiError::SessionExpired);
        }

        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Some(fields) = parse_validation_errors(&body) {
                debug!(fields = fields.len(), "Request failed validation");
                return Err(ApiError::Validation(fields));
            }
        }

        warn!(
            status = %status,
            body_summary = %summarize_response_body(&body),
            "API request failed"
        );
        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

fn parse_validation_errors(body: &str) -> Option<Vec<FieldError>> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    serde_json::from_value(parsed.detail).ok()
}

/// `{"detail": "..."}` yields the string; other JSON details are rendered
/// as-is; short plain-text bodies are used verbatim.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail
            .get("error_message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| detail.to_string()),
        Err(_) => {
            let trimmed = body.trim();
            if !trimmed.is_empty() && trimmed.len() <= 200 && !trimmed.starts_with('<') {
                trimmed.to_string()
            } else {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            }
        }
    }
}

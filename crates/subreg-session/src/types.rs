//! Wire types shared by the session layer.

use serde::{Deserialize, Serialize};

/// Profile of the signed-in user, as returned by `GET /api/v1/auth/me`.
///
/// Treated as a snapshot: a newer fetch replaces it entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub github_id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
}

/// Body of `GET /api/v1/healthz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub db_response_time_ms: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginUrlResponse {
    pub url: String,
}

//! Error types for the API pipeline and the session state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use subreg_storage::StorageError;
use thiserror::Error;

/// One entry of a 422 body: `{"loc": [...], "msg": "...", "type": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Path to the offending input, e.g. `["body", "record_type"]`.
    pub loc: Vec<String>,
    pub message: String,
    pub kind: String,
}

impl FieldError {
    /// Name of the offending field (last `loc` segment).
    pub fn field(&self) -> Option<&str> {
        self.loc.last().map(String::as_str)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.loc.join("."), self.message)
    }
}

impl<'de> Deserialize<'de> for FieldError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            loc: Vec<serde_json::Value>,
            #[serde(default)]
            msg: String,
            #[serde(default, rename = "type")]
            kind: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        let loc = raw
            .loc
            .into_iter()
            .map(|segment| match segment {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        Ok(FieldError {
            loc,
            message: raw.msg,
            kind: raw.kind,
        })
    }
}

/// Failure of a single API call.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 401. The credential has been cleared by the time this is returned.
    #[error("Session expired")]
    SessionExpired,

    /// 422 with field-level messages.
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// Any other non-success status; `message` is the server's `detail`.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    /// HTTP status the server answered with, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::SessionExpired => Some(401),
            ApiError::Validation(_) => Some(422),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Network failures and 5xx. The next poll is the only retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Failure of a session operation.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A logout or another login replaced the credential while this login
    /// was in flight. The winner's state stands.
    #[error("Login superseded by a newer session change")]
    Superseded,

    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    #[error("OAuth callback error: {0}")]
    Callback(String),

    #[error("Timed out waiting for the OAuth callback")]
    CallbackTimeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Api(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_parses_mixed_loc() {
        let fields: Vec<FieldError> = serde_json::from_str(
            r#"[{"loc":["body","record_type"],"msg":"Record type must be one of: A, CNAME","type":"value_error"},
                {"loc":["body",0],"msg":"bad","type":"type_error"}]"#,
        )
        .unwrap();

        assert_eq!(fields[0].field(), Some("record_type"));
        assert_eq!(fields[0].kind, "value_error");
        assert_eq!(fields[1].loc, vec!["body".to_string(), "0".to_string()]);
        assert_eq!(fields[0].to_string(), "body.record_type: Record type must be one of: A, CNAME");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::SessionExpired.status(), Some(401));
        assert_eq!(ApiError::Validation(vec![]).status(), Some(422));
        let not_found = ApiError::Status {
            status: 404,
            message: "Subdomain not found".into(),
        };
        assert_eq!(not_found.status(), Some(404));
        assert_eq!(ApiError::Decode("x".into()).status(), None);
    }

    #[test]
    fn test_is_transient() {
        let server = ApiError::Status {
            status: 503,
            message: "down".into(),
        };
        let client = ApiError::Status {
            status: 400,
            message: "Maximum limit of 5 domains reached".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!ApiError::SessionExpired.is_transient());
        assert!(AuthError::Api(server).is_transient());
        assert!(!AuthError::Superseded.is_transient());
    }
}

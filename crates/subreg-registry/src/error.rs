use subreg_session::{ApiError, FieldError};
use thiserror::Error;

/// Failure of a registry operation, as shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No credential is held; nothing was sent.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The server rejected the credential; it has been cleared.
    #[error("Session expired, sign in again")]
    SessionExpired,

    #[error("Invalid input: {}", join_fields(.0))]
    ValidationFailed(Vec<FieldError>),

    #[error("{}", describe_failure(*.status, .message))]
    NetworkOrServer {
        status: Option<u16>,
        message: String,
    },
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_failure(status: Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("Request failed ({}): {}", status, message),
        None => format!("Request failed: {}", message),
    }
}

impl RegistryError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::SessionExpired => Some(401),
            RegistryError::ValidationFailed(_) => Some(422),
            RegistryError::NetworkOrServer { status, .. } => *status,
            RegistryError::NotAuthenticated => None,
        }
    }

    /// Network failures, 5xx and 429. The next poll retries these.
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::NetworkOrServer { status: None, .. } => true,
            RegistryError::NetworkOrServer {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            RegistryError::ValidationFailed(fields) => fields,
            _ => &[],
        }
    }
}

impl From<ApiError> for RegistryError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionExpired => RegistryError::SessionExpired,
            ApiError::Validation(fields) => RegistryError::ValidationFailed(fields),
            ApiError::Status { status, message } => RegistryError::NetworkOrServer {
                status: Some(status),
                message,
            },
            ApiError::Http(e) => RegistryError::NetworkOrServer {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            other => RegistryError::NetworkOrServer {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

//! Storage key constants.

/// Storage keys used by the client.
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer credential of the current session.
    pub const AUTH_TOKEN: &'static str = "auth_token";
}

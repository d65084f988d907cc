//! Storage trait definitions.

use crate::StorageResult;

/// Key/value backend for secrets.
///
/// Every operation is synchronous and, for persistent backends, durable once
/// it returns. A missing key is `Ok(None)`, never an error.
pub trait SecureStorage: Send + Sync {
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Remove a value. Returns whether anything was removed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

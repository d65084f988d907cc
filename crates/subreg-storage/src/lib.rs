//! Credential storage for the subreg client.
//!
//! - [`FileStorage`]: one file per key under the state directory. Several
//!   processes sharing a directory see each other's writes.
//! - [`MemoryStorage`]: process-local, for tests.

mod file;
mod keys;
mod memory;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Stored bytes are not valid UTF-8.
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

//! File system layout of the client state directory.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

const STATE_DIR_NAME: &str = ".subreg";

/// Paths under the state directory (`~/.subreg` unless overridden).
///
/// Two processes pointed at the same base directory share one credential,
/// the way two browser tabs share one origin's storage.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(STATE_DIR_NAME),
        })
    }

    /// Use a custom base directory (tests, `--state-dir`).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `~/.subreg/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Directory holding one file per stored secret (`~/.subreg/credentials`).
    pub fn credentials_dir(&self) -> PathBuf {
        self.base_dir.join("credentials")
    }

    /// `~/.subreg/logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// `~/.subreg/logs/client.jsonl`
    pub fn client_log_file(&self) -> PathBuf {
        self.logs_dir().join("client.jsonl")
    }

    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.credentials_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

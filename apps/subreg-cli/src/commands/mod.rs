//! CLI command implementations.

mod auth;
mod subdomains;

pub use auth::{health, login, logout, status};
pub use subdomains::{
    subdomains_create, subdomains_delete, subdomains_list, subdomains_show, subdomains_update,
    subdomains_watch, DraftArgs,
};

use anyhow::Result;
use std::sync::Arc;
use subreg_config::{Config, Paths};
use subreg_registry::SubdomainRegistry;
use subreg_session::{ApiClient, AuthSession, BrowserNavigator, SessionEventBus, TokenStore};
use subreg_storage::FileStorage;
use tracing::debug;

/// Everything a command needs, built once per invocation.
pub struct Context {
    pub config: Config,
    pub tokens: Arc<TokenStore>,
    pub api: ApiClient,
}

impl Context {
    pub fn new(paths: &Paths, config: Config) -> Result<Self> {
        let storage = FileStorage::new(paths.credentials_dir())?;
        let tokens = Arc::new(TokenStore::new(Arc::new(storage), SessionEventBus::new()));
        let base_url = config.api_base_url()?;
        debug!(api_base_url = %base_url, "Using API");
        let api = ApiClient::new(base_url, tokens.clone())?;

        Ok(Self {
            config,
            tokens,
            api,
        })
    }

    pub fn session(&self) -> Arc<AuthSession> {
        Arc::new(AuthSession::new(
            self.api.clone(),
            Arc::new(BrowserNavigator::new(None)),
        ))
    }

    pub fn registry(&self) -> Arc<SubdomainRegistry> {
        Arc::new(SubdomainRegistry::new(self.api.clone()))
    }
}

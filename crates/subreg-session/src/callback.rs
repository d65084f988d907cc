//! One-shot handling of the OAuth redirect.
//!
//! The backend redirects to `<callback>?token=<jwt>`. Only `token` is
//! accepted; a redirect carrying `code` instead is treated as having no token.

use crate::session::AuthSession;
use crate::token_store::Credential;
use crate::types::User;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const TOKEN_PARAM: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The redirect carried no token (direct visit, or an unsupported parameter).
    NoToken,
    LoggedIn(User),
    /// A token arrived but the login did not complete.
    Failed(String),
}

impl CallbackOutcome {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, CallbackOutcome::LoggedIn(_))
    }
}

pub struct OAuthCallbackHandler {
    session: Arc<AuthSession>,
}

impl OAuthCallbackHandler {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    /// Complete the login carried by `url` (if any), then return to the
    /// landing view whatever the outcome.
    pub async fn handle(&self, url: &Url) -> CallbackOutcome {
        let outcome = match extract_token(url) {
            None => {
                debug!("Callback without token");
                CallbackOutcome::NoToken
            }
            Some(token) => match self.session.complete_login(token).await {
                Ok(user) => {
                    info!(user_id = %user.id, "OAuth callback completed login");
                    CallbackOutcome::LoggedIn(user)
                }
                Err(e) => {
                    warn!(error = %e, "OAuth callback failed to complete login");
                    CallbackOutcome::Failed(e.to_string())
                }
            },
        };

        self.session.navigator().redirect_landing();
        outcome
    }
}

/// The non-empty `token` query parameter of a redirect URL.
pub fn extract_token(url: &Url) -> Option<Credential> {
    let mut saw_code = false;
    for (key, value) in url.query_pairs() {
        if key == TOKEN_PARAM && !value.is_empty() {
            return Some(Credential::new(value.into_owned()));
        }
        if key == "code" {
            saw_code = true;
        }
    }
    if saw_code {
        warn!("Callback carried `code` instead of `token`; ignoring it");
    }
    None
}

//! Authentication session driven by the state machine in [`crate::auth_fsm`].
//!
//! `AuthSession` owns the current user and is the only thing that moves the
//! session between states. It learns about credential changes made elsewhere
//! (a 401 in the registry, another process logging out) through the
//! [`SessionEventBus`](crate::SessionEventBus): pending events are folded in
//! before every read, and [`AuthSession::spawn_listener`] applies them as they
//! arrive.

use crate::api_client::ApiClient;
use crate::auth_fsm::{SessionInput, SessionMachine, SessionState};
use crate::error::{AuthError, AuthResult};
use crate::events::{ChangeOrigin, ClearReason, SessionEvent, SessionSubscription};
use crate::navigator::Navigator;
use crate::token_store::{Credential, TokenStore};
use crate::types::User;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup check has not run yet.
    Uninitialized,
    /// A stored credential is being verified against the profile endpoint.
    Checking,
    Authenticated(User),
    Anonymous,
}

/// Observable session snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub status: SessionStatus,
    pub is_loading: bool,
}

impl Session {
    /// False while the outcome of the credential check is still unknown.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self.status,
            SessionStatus::Uninitialized | SessionStatus::Checking
        )
    }

    /// Protected views render only for a verified user.
    pub fn can_render_protected(&self) -> bool {
        self.is_authenticated()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, SessionStatus::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match &self.status {
            SessionStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

struct Inner {
    machine: SessionMachine,
    user: Option<User>,
    /// Async operations currently awaiting the network.
    in_flight: usize,
    /// Bumped on every credential change; async results carrying an older
    /// value are discarded.
    generation: u64,
}

impl Inner {
    fn snapshot(&self) -> Session {
        let status = match (self.machine.state(), &self.user) {
            (SessionState::Uninitialized, _) => SessionStatus::Uninitialized,
            (SessionState::Checking, _) => SessionStatus::Checking,
            (SessionState::Authenticated, Some(user)) => SessionStatus::Authenticated(user.clone()),
            (SessionState::Authenticated, None) => SessionStatus::Checking,
            (SessionState::Anonymous, _) => SessionStatus::Anonymous,
        };
        Session {
            status,
            is_loading: self.in_flight > 0,
        }
    }
}

/// Marks the session as loading for as long as it lives.
struct LoadingGuard<'a> {
    session: &'a AuthSession,
}

impl<'a> LoadingGuard<'a> {
    fn begin(session: &'a AuthSession, inner: &mut Inner) -> Self {
        inner.in_flight += 1;
        Self { session }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        self.session.publish(&inner);
    }
}

pub struct AuthSession {
    api: ApiClient,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    inner: Mutex<Inner>,
    pending: Mutex<SessionSubscription>,
    status_tx: watch::Sender<Session>,
}

impl AuthSession {
    pub fn new(api: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        let tokens = api.tokens().clone();
        let pending = tokens.events().subscribe();
        let inner = Inner {
            machine: SessionMachine::new(),
            user: None,
            in_flight: 0,
            generation: 0,
        };
        let (status_tx, _) = watch::channel(inner.snapshot());

        Self {
            api,
            tokens,
            navigator,
            inner: Mutex::new(inner),
            pending: Mutex::new(pending),
            status_tx,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn session(&self) -> Session {
        self.sync();
        self.inner.lock().snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.session().status
    }

    pub fn current_user(&self) -> Option<User> {
        self.sync();
        self.inner.lock().user.clone()
    }

    /// Receiver that sees every published session change.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.status_tx.subscribe()
    }

    /// Startup check: no credential means `Anonymous`; otherwise verify it
    /// with a profile fetch, clearing it on any failure.
    pub async fn initialize(&self) -> Session {
        self.revalidate().await
    }

    /// Re-run the credential check from whatever state the session is in.
    pub async fn revalidate(&self) -> Session {
        self.sync();

        let credential = self.tokens.get().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored credential");
            None
        });

        let Some(credential) = credential else {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.user = None;
            self.advance(&mut inner, SessionInput::NoCredential);
            self.publish(&inner);
            debug!("No stored credential");
            return inner.snapshot();
        };

        let (generation, _loading) = {
            let mut inner = self.inner.lock();
            let input = if *inner.machine.state() == SessionState::Uninitialized {
                SessionInput::CredentialFound
            } else {
                SessionInput::Recheck
            };
            self.advance(&mut inner, input);
            inner.generation += 1;
            let guard = LoadingGuard::begin(self, &mut inner);
            self.publish(&inner);
            (inner.generation, guard)
        };

        debug!("Verifying stored credential");
        let result = self.api.fetch_profile().await;
        self.sync();

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!("Session changed during profile check, result discarded");
            return inner.snapshot();
        }

        match result {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "Session verified");
                inner.user = Some(user);
                self.advance(&mut inner, SessionInput::ProfileLoaded);
            }
            Err(e) => {
                warn!(error = %e, "Stored credential failed verification, clearing session");
                inner.user = None;
                self.advance(&mut inner, SessionInput::ProfileFailed);
                if let Err(e) = self
                    .tokens
                    .invalidate(&credential, ClearReason::SessionExpired)
                {
                    warn!(error = %e, "Failed to clear rejected credential");
                }
            }
        }
        self.publish(&inner);
        inner.snapshot()
    }

    /// Ask the API for the provider sign-in URL and send the user there.
    ///
    /// Does nothing while another session operation is loading. Failures are
    /// logged and leave the state unchanged. Returns the URL that was opened.
    pub async fn login(&self) -> Option<Url> {
        let _loading = {
            let mut inner = self.inner.lock();
            if inner.in_flight > 0 {
                debug!("Session busy, login ignored");
                return None;
            }
            let guard = LoadingGuard::begin(self, &mut inner);
            self.publish(&inner);
            guard
        };

        match self.api.fetch_login_url().await {
            Ok(url) => {
                if let Err(e) = self.navigator.navigate_external(&url) {
                    warn!(error = %e, "Failed to open provider sign-in page");
                }
                Some(url)
            }
            Err(e) => {
                warn!(error = %e, "Failed to start login");
                None
            }
        }
    }

    /// Store a credential delivered by the OAuth redirect and verify it.
    ///
    /// On failure the credential is removed again (if it is still the held
    /// one) and the session is `Anonymous`. If a logout or another login
    /// replaced the credential while the profile was loading, the result is
    /// [`AuthError::Superseded`] and the newer state stands.
    pub async fn complete_login(&self, credential: Credential) -> AuthResult<User> {
        self.sync();
        self.tokens.set(&credential)?;

        let (generation, _loading) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            let guard = LoadingGuard::begin(self, &mut inner);
            self.publish(&inner);
            (inner.generation, guard)
        };

        let result = self.api.fetch_profile().await;
        self.sync();

        let still_held = matches!(self.tokens.get(), Ok(Some(ref held)) if *held == credential);
        let mut inner = self.inner.lock();
        let superseded = inner.generation != generation || !still_held;

        match result {
            Ok(user) if !superseded => {
                info!(user_id = %user.id, username = %user.username, "Login completed");
                inner.user = Some(user.clone());
                self.advance(&mut inner, SessionInput::LoginCompleted);
                self.publish(&inner);
                Ok(user)
            }
            Ok(_) => {
                info!("Login superseded by a newer session change");
                Err(AuthError::Superseded)
            }
            Err(e) => {
                warn!(error = %e, "Login failed, clearing credential");
                if !superseded {
                    inner.user = None;
                    self.advance(&mut inner, SessionInput::CredentialCleared);
                    self.publish(&inner);
                }
                drop(inner);
                if let Err(clear_err) = self
                    .tokens
                    .invalidate(&credential, ClearReason::LoginRejected)
                {
                    warn!(error = %clear_err, "Failed to clear rejected credential");
                }
                Err(e.into())
            }
        }
    }

    /// Clear the credential, go `Anonymous` and reload the landing view.
    pub fn logout(&self) -> AuthResult<()> {
        self.tokens.clear(ClearReason::Logout)?;
        {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.user = None;
            self.advance(&mut inner, SessionInput::CredentialCleared);
            self.publish(&inner);
        }
        info!("Logged out");
        self.navigator.reload_landing();
        Ok(())
    }

    /// Fold credential changes made since the last call into the state.
    pub fn sync(&self) {
        if let Err(e) = self.tokens.sync_external() {
            warn!(error = %e, "Failed to check credential storage");
        }

        let events = self.pending.lock().drain();
        if events.is_empty() {
            return;
        }

        let mut inner = self.inner.lock();
        for event in events {
            self.apply_event(&mut inner, event);
        }
        self.publish(&inner);
    }

    /// Apply credential events as they arrive, and re-verify when another
    /// process stores a new credential. The task ends with the session.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.tokens.events().subscribe();
        let session = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.sync();
                if event
                    == (SessionEvent::CredentialStored {
                        origin: ChangeOrigin::External,
                    })
                {
                    session.revalidate().await;
                }
            }
            debug!("Session listener stopped");
        })
    }

    fn apply_event(&self, inner: &mut Inner, event: SessionEvent) {
        match event {
            SessionEvent::CredentialCleared { reason } => {
                inner.generation += 1;
                if *inner.machine.state() != SessionState::Anonymous {
                    info!(reason = ?reason, "Session ended");
                }
                inner.user = None;
                self.advance(inner, SessionInput::CredentialCleared);
            }
            SessionEvent::CredentialStored {
                origin: ChangeOrigin::External,
            } => {
                inner.generation += 1;
                if *inner.machine.state() != SessionState::Uninitialized {
                    inner.user = None;
                    self.advance(inner, SessionInput::Recheck);
                }
            }
            SessionEvent::CredentialStored {
                origin: ChangeOrigin::Local,
            } => {}
        }
    }

    fn transition(&self, inner: &mut Inner, input: SessionInput) -> AuthResult<()> {
        let old_state = inner.machine.state().clone();

        inner.machine.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input, old_state
            ))
        })?;

        let new_state = inner.machine.state();
        if old_state != *new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
        }
        Ok(())
    }

    /// [`transition`](Self::transition), logging instead of failing.
    fn advance(&self, inner: &mut Inner, input: SessionInput) {
        if let Err(e) = self.transition(inner, input) {
            warn!(error = %e, "Ignoring session input");
        }
    }

    fn publish(&self, inner: &Inner) {
        let next = inner.snapshot();
        self.status_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

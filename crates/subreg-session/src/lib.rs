//! Session layer of the subreg client.
//!
//! - [`TokenStore`]: the one bearer credential, persisted through a
//!   [`SecureStorage`](subreg_storage::SecureStorage) backend
//! - [`SessionEventBus`]: credential-change notifications
//! - [`ApiClient`]: request pipeline attaching the credential and reacting to 401
//! - [`AuthSession`]: authentication state machine
//! - [`OAuthCallbackHandler`] / [`CallbackServer`]: OAuth redirect handling

mod api_client;
mod auth_fsm;
mod callback;
mod callback_server;
mod error;
mod events;
mod navigator;
mod session;
mod token_store;
mod types;

pub use api_client::{ApiClient, Endpoints};
pub use auth_fsm::{SessionInput, SessionMachine, SessionState};
pub use callback::{extract_token, CallbackOutcome, OAuthCallbackHandler};
pub use callback_server::CallbackServer;
pub use error::{ApiError, ApiResult, AuthError, AuthResult, FieldError};
pub use events::{ChangeOrigin, ClearReason, SessionEvent, SessionEventBus, SessionSubscription};
pub use navigator::{BrowserNavigator, Navigation, Navigator, RecordingNavigator};
pub use session::{AuthSession, Session, SessionStatus};
pub use token_store::{Credential, CredentialWatcher, TokenStore, DEFAULT_WATCH_INTERVAL};
pub use types::{HealthStatus, User};

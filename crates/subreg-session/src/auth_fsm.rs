//! Session state machine using rust-fsm.
//!
//! ```text
//! Uninitialized ──NoCredential──────────────► Anonymous
//!       │                                      ▲   │
//!       │ CredentialFound          ProfileFailed│   │LoginCompleted
//!       ▼                       CredentialCleared│   ▼
//!   Checking ──ProfileLoaded──► Authenticated ───┘
//!       ▲                            │
//!       └────────── Recheck ─────────┘
//! ```
//!
//! `Checking` is only re-entered on demand: an explicit revalidation or a
//! credential written by another process.

use rust_fsm::*;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        NoCredential => Anonymous,
        CredentialFound => Checking,
        CredentialCleared => Anonymous,
        LoginCompleted => Authenticated
    },
    Checking => {
        ProfileLoaded => Authenticated,
        ProfileFailed => Anonymous,
        NoCredential => Anonymous,
        CredentialCleared => Anonymous,
        LoginCompleted => Authenticated,
        Recheck => Checking
    },
    Anonymous => {
        LoginCompleted => Authenticated,
        Recheck => Checking,
        NoCredential => Anonymous,
        CredentialCleared => Anonymous
    },
    Authenticated => {
        LoginCompleted => Authenticated,
        Recheck => Checking,
        NoCredential => Anonymous,
        CredentialCleared => Anonymous
    }
}

pub use session_machine::Input as SessionInput;
pub use session_machine::State as SessionState;
pub use session_machine::StateMachine as SessionMachine;

//! Credential-change notifications.
//!
//! Every write to the [`TokenStore`](crate::TokenStore) publishes exactly one
//! [`SessionEvent`]. Interested components hold a [`SessionSubscription`];
//! dropping it unsubscribes.

use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 64;

/// Where a stored credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this process's store.
    Local,
    /// Written by another process sharing the same storage.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    Logout,
    /// The server answered 401 for the held credential.
    SessionExpired,
    /// A freshly delivered credential failed its profile check.
    LoginRejected,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    CredentialStored { origin: ChangeOrigin },
    CredentialCleared { reason: ClearReason },
}

impl SessionEvent {
    pub fn is_stored(&self) -> bool {
        matches!(self, SessionEvent::CredentialStored { .. })
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, SessionEvent::CredentialCleared { .. })
    }
}

/// Broadcast channel for [`SessionEvent`]s. Cloning shares the channel.
#[derive(Clone)]
pub struct SessionEventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Deliver `event` to every live subscription. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: SessionEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!(event = ?event, subscribers = delivered, "Session event published");
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Wait for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// All events delivered so far, oldest first.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

//! The single bearer credential and its change notifications.

use crate::events::{ChangeOrigin, ClearReason, SessionEvent, SessionEventBus};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use subreg_storage::{SecureStorage, StorageKeys, StorageResult};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often [`CredentialWatcher`] looks for writes made by other processes.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Opaque bearer token. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Holds at most one [`Credential`] in a [`SecureStorage`] backend.
///
/// Every `set`/`clear` publishes exactly one [`SessionEvent`]. Writes made by
/// another process sharing the backend are turned into `External` events by
/// [`TokenStore::sync_external`].
pub struct TokenStore {
    storage: Arc<dyn SecureStorage>,
    events: SessionEventBus,
    /// Last value this store wrote or observed. Also serializes writers.
    last_seen: Mutex<Option<String>>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SecureStorage>, events: SessionEventBus) -> Self {
        let initial = storage
            .get(StorageKeys::AUTH_TOKEN)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read stored credential");
                None
            });
        Self {
            storage,
            events,
            last_seen: Mutex::new(initial),
        }
    }

    pub fn events(&self) -> &SessionEventBus {
        &self.events
    }

    /// The current credential. Absence is `Ok(None)`.
    pub fn get(&self) -> StorageResult<Option<Credential>> {
        Ok(self
            .storage
            .get(StorageKeys::AUTH_TOKEN)?
            .filter(|token| !token.is_empty())
            .map(Credential))
    }

    pub fn has_credential(&self) -> bool {
        matches!(self.get(), Ok(Some(_)))
    }

    /// Replace the credential.
    pub fn set(&self, credential: &Credential) -> StorageResult<()> {
        let mut last_seen = self.last_seen.lock();
        self.storage
            .set(StorageKeys::AUTH_TOKEN, credential.expose())?;
        *last_seen = Some(credential.0.clone());
        drop(last_seen);

        info!("Credential stored");
        self.events.publish(SessionEvent::CredentialStored {
            origin: ChangeOrigin::Local,
        });
        Ok(())
    }

    /// Remove the credential. Returns whether one was present.
    pub fn clear(&self, reason: ClearReason) -> StorageResult<bool> {
        let mut last_seen = self.last_seen.lock();
        let removed = self.storage.delete(StorageKeys::AUTH_TOKEN)?;
        *last_seen = None;
        drop(last_seen);

        info!(reason = ?reason, removed, "Credential cleared");
        self.events
            .publish(SessionEvent::CredentialCleared { reason });
        Ok(removed)
    }

    /// Clear the credential only if it is still `rejected`.
    ///
    /// Several requests can fail with 401 for the same credential; only the
    /// first clears it and publishes. A credential written in the meantime
    /// (new login, another process) is left alone.
    pub fn invalidate(&self, rejected: &Credential, reason: ClearReason) -> StorageResult<bool> {
        let mut last_seen = self.last_seen.lock();
        let current = self.storage.get(StorageKeys::AUTH_TOKEN)?;
        if current.as_deref() != Some(rejected.expose()) {
            debug!("Rejected credential already replaced or cleared");
            return Ok(false);
        }

        self.storage.delete(StorageKeys::AUTH_TOKEN)?;
        *last_seen = None;
        drop(last_seen);

        info!(reason = ?reason, "Rejected credential cleared");
        self.events
            .publish(SessionEvent::CredentialCleared { reason });
        Ok(true)
    }

    /// Re-read the backend and publish an `External` event if another process
    /// changed the credential since this store last looked.
    pub fn sync_external(&self) -> StorageResult<bool> {
        let mut last_seen = self.last_seen.lock();
        let current = self.storage.get(StorageKeys::AUTH_TOKEN)?;
        if current == *last_seen {
            return Ok(false);
        }

        let event = match current.as_deref() {
            Some(token) if !token.is_empty() => SessionEvent::CredentialStored {
                origin: ChangeOrigin::External,
            },
            _ => SessionEvent::CredentialCleared {
                reason: ClearReason::External,
            },
        };
        *last_seen = current;
        drop(last_seen);

        info!(event = ?event, "Credential changed by another process");
        self.events.publish(event);
        Ok(true)
    }

    /// Start a task calling [`sync_external`](Self::sync_external) every `interval`.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> CredentialWatcher {
        let store = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                if let Err(e) = store.sync_external() {
                    warn!(error = %e, "Failed to check credential storage");
                }
            }
            debug!("Credential watcher stopped");
        });
        CredentialWatcher { handle }
    }
}

/// Background task behind [`TokenStore::spawn_watcher`]. Stops on drop.
pub struct CredentialWatcher {
    handle: JoinHandle<()>,
}

impl CredentialWatcher {
    pub fn stop(self) {}
}

impl Drop for CredentialWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subreg_storage::{FileStorage, MemoryStorage};

    fn memory_store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStorage::new()), SessionEventBus::new())
    }

    #[test]
    fn test_absent_credential_is_none() {
        let store = memory_store();
        assert_eq!(store.get().unwrap(), None);
        assert!(!store.has_credential());
    }

    #[test]
    fn test_set_and_clear_publish_once_each() {
        let store = memory_store();
        let mut sub = store.events().subscribe();

        store.set(&Credential::new("abc")).unwrap();
        assert_eq!(store.get().unwrap(), Some(Credential::new("abc")));
        assert!(store.clear(ClearReason::Logout).unwrap());
        assert!(!store.clear(ClearReason::Logout).unwrap());

        assert_eq!(
            sub.drain(),
            vec![
                SessionEvent::CredentialStored {
                    origin: ChangeOrigin::Local
                },
                SessionEvent::CredentialCleared {
                    reason: ClearReason::Logout
                },
                SessionEvent::CredentialCleared {
                    reason: ClearReason::Logout
                },
            ]
        );
    }

    #[test]
    fn test_invalidate_clears_only_matching_credential_once() {
        let store = memory_store();
        let old = Credential::new("old");
        store.set(&old).unwrap();
        let mut sub = store.events().subscribe();

        assert!(store.invalidate(&old, ClearReason::SessionExpired).unwrap());
        assert!(!store.invalidate(&old, ClearReason::SessionExpired).unwrap());
        assert_eq!(sub.drain().len(), 1);

        let fresh = Credential::new("fresh");
        store.set(&fresh).unwrap();
        assert!(!store.invalidate(&old, ClearReason::SessionExpired).unwrap());
        assert_eq!(store.get().unwrap(), Some(fresh));
    }

    #[test]
    fn test_sync_external_sees_other_process_writes() {
        let dir = tempfile::tempdir().unwrap();
        let tab_a = TokenStore::new(
            Arc::new(FileStorage::new(dir.path()).unwrap()),
            SessionEventBus::new(),
        );
        let tab_b = TokenStore::new(
            Arc::new(FileStorage::new(dir.path()).unwrap()),
            SessionEventBus::new(),
        );
        let mut b_events = tab_b.events().subscribe();

        assert!(!tab_b.sync_external().unwrap());

        tab_a.set(&Credential::new("shared")).unwrap();
        assert!(tab_b.sync_external().unwrap());
        assert!(!tab_b.sync_external().unwrap());

        tab_a.clear(ClearReason::Logout).unwrap();
        assert!(tab_b.sync_external().unwrap());

        assert_eq!(
            b_events.drain(),
            vec![
                SessionEvent::CredentialStored {
                    origin: ChangeOrigin::External
                },
                SessionEvent::CredentialCleared {
                    reason: ClearReason::External
                },
            ]
        );
    }

    #[test]
    fn test_own_writes_are_not_external() {
        let store = memory_store();
        store.set(&Credential::new("mine")).unwrap();
        assert!(!store.sync_external().unwrap());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[tokio::test]
    async fn test_watcher_publishes_external_changes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TokenStore::new(
            Arc::new(FileStorage::new(dir.path()).unwrap()),
            SessionEventBus::new(),
        );
        let watched = Arc::new(TokenStore::new(
            Arc::new(FileStorage::new(dir.path()).unwrap()),
            SessionEventBus::new(),
        ));
        let mut events = watched.events().subscribe();
        let _watcher = watched.spawn_watcher(Duration::from_millis(20));

        writer.set(&Credential::new("from-elsewhere")).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(SessionEvent::CredentialStored {
                origin: ChangeOrigin::External
            })
        );
    }
}

//! The user's subdomains: a cache kept in step with the server.
//!
//! Reads never touch the network. `refresh` replaces the cache with the
//! server list; `create`/`update` change it only once the server confirmed;
//! `delete` removes the entry before the request goes out and restores it if
//! the request fails.

use crate::cache::Cache;
use crate::error::{RegistryError, RegistryResult};
use crate::types::{Subdomain, SubdomainDraft, SubdomainId};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use subreg_session::{ApiClient, ApiError, Endpoints};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct SubdomainRegistry {
    api: ApiClient,
    cache: Mutex<Cache>,
    submitting: AtomicUsize,
    last_error: Mutex<Option<RegistryError>>,
    list_tx: watch::Sender<Vec<Subdomain>>,
}

impl SubdomainRegistry {
    pub fn new(api: ApiClient) -> Self {
        let (list_tx, _) = watch::channel(Vec::new());
        Self {
            api,
            cache: Mutex::new(Cache::default()),
            submitting: AtomicUsize::new(0),
            last_error: Mutex::new(None),
            list_tx,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Cached subdomains in creation order. Empty whenever no credential is held.
    pub fn list(&self) -> Vec<Subdomain> {
        if !self.api.tokens().has_credential() {
            self.clear();
            return Vec::new();
        }
        self.cache.lock().entries().to_vec()
    }

    /// Receiver that sees every change of [`list`](Self::list).
    pub fn watch(&self) -> watch::Receiver<Vec<Subdomain>> {
        self.list_tx.subscribe()
    }

    /// True while a create or update is awaiting the server.
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst) > 0
    }

    /// Error of the most recent failed refresh, cleared by the next success.
    pub fn last_error(&self) -> Option<RegistryError> {
        self.last_error.lock().clone()
    }

    /// Fetch the server list and replace the cache with it.
    ///
    /// Without a credential nothing is sent and the result is `Ok(false)`.
    /// `Ok(false)` is also returned when a newer refresh or a logout
    /// overtook this one. On failure the cache is kept as it was.
    pub async fn refresh(&self) -> RegistryResult<bool> {
        if !self.api.tokens().has_credential() {
            debug!("No credential, refresh skipped");
            return Ok(false);
        }

        let ticket = self.cache.lock().begin_refresh();
        match self.api.get::<Vec<Subdomain>>(Endpoints::SUBDOMAINS).await {
            Ok(server) => {
                let count = server.len();
                let applied = {
                    let mut cache = self.cache.lock();
                    let applied = cache.finish_refresh(ticket, server);
                    if applied {
                        self.publish(&cache);
                    }
                    applied
                };
                if applied {
                    *self.last_error.lock() = None;
                    debug!(ticket, count, "Subdomains refreshed");
                } else {
                    debug!(ticket, "Superseded refresh discarded");
                }
                Ok(applied)
            }
            Err(e) => {
                let err = RegistryError::from(e);
                warn!(ticket, error = %err, "Subdomain refresh failed");
                *self.last_error.lock() = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Submit a new record. The cache gains the server's entry on success
    /// and is untouched otherwise.
    pub async fn create(&self, draft: &SubdomainDraft) -> RegistryResult<Subdomain> {
        self.require_credential()?;
        let _submitting = SubmittingGuard::begin(&self.submitting);

        let created: Subdomain = self
            .api
            .post(Endpoints::SUBDOMAINS, draft)
            .await
            .map_err(|e| self.log_failure("create", e))?;

        info!(id = created.id, subdomain = %created.subdomain, "Subdomain created");
        let mut cache = self.cache.lock();
        cache.upsert(created.clone());
        self.publish(&cache);
        Ok(created)
    }

    /// Replace a record's fields. The cached entry is swapped in place once
    /// the server confirmed.
    pub async fn update(
        &self,
        id: SubdomainId,
        draft: &SubdomainDraft,
    ) -> RegistryResult<Subdomain> {
        self.require_credential()?;
        let _submitting = SubmittingGuard::begin(&self.submitting);

        let updated: Subdomain = self
            .api
            .put(&Endpoints::subdomain(id), draft)
            .await
            .map_err(|e| self.log_failure("update", e))?;

        info!(id = updated.id, subdomain = %updated.subdomain, "Subdomain updated");
        let mut cache = self.cache.lock();
        cache.upsert(updated.clone());
        self.publish(&cache);
        Ok(updated)
    }

    /// Fetch one record and store it in the cache. A 404 drops the cached entry.
    pub async fn get(&self, id: SubdomainId) -> RegistryResult<Subdomain> {
        self.require_credential()?;

        match self.api.get::<Subdomain>(&Endpoints::subdomain(id)).await {
            Ok(subdomain) => {
                let mut cache = self.cache.lock();
                cache.upsert(subdomain.clone());
                self.publish(&cache);
                Ok(subdomain)
            }
            Err(e) => {
                let err = self.log_failure("get", e);
                if err.status() == Some(404) {
                    let mut cache = self.cache.lock();
                    cache.forget(id);
                    self.publish(&cache);
                }
                Err(err)
            }
        }
    }

    /// Delete a record.
    ///
    /// The entry leaves the cache as soon as this is called, before the
    /// returned future is polled. It comes back at its old position if the
    /// request fails or the future is dropped unfinished. An id that is not
    /// cached is still sent to the server.
    pub fn delete(&self, id: SubdomainId) -> impl Future<Output = RegistryResult<()>> + Send + '_ {
        let begun = self.require_credential().map(|()| DeleteTxn::begin(self, id));

        async move {
            let txn = begun?;
            match self.api.delete(&Endpoints::subdomain(id)).await {
                Ok(()) => {
                    info!(id, "Subdomain deleted");
                    txn.commit();
                    Ok(())
                }
                Err(e) => Err(self.log_failure("delete", e)),
            }
        }
    }

    /// Empty the cache and drop refreshes still in flight.
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        let had_entries = !cache.is_empty();
        cache.clear();
        if !had_entries {
            return;
        }
        self.publish(&cache);
        drop(cache);
        *self.last_error.lock() = None;
        debug!("Subdomain cache cleared");
    }

    fn require_credential(&self) -> RegistryResult<()> {
        if self.api.tokens().has_credential() {
            Ok(())
        } else {
            Err(RegistryError::NotAuthenticated)
        }
    }

    fn log_failure(&self, operation: &'static str, err: ApiError) -> RegistryError {
        let err = RegistryError::from(err);
        match &err {
            RegistryError::ValidationFailed(fields) => {
                debug!(operation, fields = fields.len(), "Subdomain input rejected")
            }
            _ => warn!(operation, error = %err, "Subdomain request failed"),
        }
        err
    }

    fn publish(&self, cache: &Cache) {
        let next = cache.entries();
        self.list_tx.send_if_modified(|current| {
            if current.as_slice() == next {
                return false;
            }
            *current = next.to_vec();
            true
        });
    }
}

/// Counts an in-flight create or update.
struct SubmittingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> SubmittingGuard<'a> {
    fn begin(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An optimistic delete. Rolls back on drop unless committed.
struct DeleteTxn<'a> {
    registry: &'a SubdomainRegistry,
    id: SubdomainId,
    committed: bool,
}

impl<'a> DeleteTxn<'a> {
    fn begin(registry: &'a SubdomainRegistry, id: SubdomainId) -> Self {
        let mut cache = registry.cache.lock();
        if cache.remove_pending(id) {
            registry.publish(&cache);
        } else {
            debug!(id, "Deleting subdomain that is not cached");
        }
        Self {
            registry,
            id,
            committed: false,
        }
    }

    fn commit(mut self) {
        let mut cache = self.registry.cache.lock();
        cache.commit_delete(self.id);
        self.registry.publish(&cache);
        drop(cache);
        self.committed = true;
    }
}

impl Drop for DeleteTxn<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut cache = self.registry.cache.lock();
        if cache.rollback_delete(self.id) {
            debug!(id = self.id, "Subdomain restored after failed delete");
            self.registry.publish(&cache);
        }
    }
}

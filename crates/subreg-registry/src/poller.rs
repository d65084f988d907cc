//! Background refresh loop for a [`SubdomainRegistry`].

use crate::registry::SubdomainRegistry;
use std::sync::Arc;
use std::time::Duration;
use subreg_session::{SessionEvent, SessionSubscription};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Running poll loop. Dropping it cancels the loop and any refresh in flight.
pub struct PollHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the loop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                warn!(error = %e, "Subdomain poller ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}

impl SubdomainRegistry {
    /// Keep the cache fresh while a credential is held.
    ///
    /// Refreshes right away, then every `every`, and immediately whenever a
    /// credential is stored. When the credential is cleared the cache is
    /// emptied and the loop waits, with no timer, for the next one.
    pub fn start_polling(self: &Arc<Self>, every: Duration) -> PollHandle {
        let events = self.api().tokens().events().subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let registry = Arc::clone(self);

        let task = tokio::spawn(poll_loop(registry, events, every, shutdown_rx));
        PollHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

async fn poll_loop(
    registry: Arc<SubdomainRegistry>,
    mut events: SessionSubscription,
    every: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut active = registry.api().tokens().has_credential();
    let mut refresh_now = active;
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.reset();

    info!(
        interval_secs = every.as_secs(),
        active, "Subdomain polling started"
    );

    loop {
        if refresh_now {
            refresh_now = false;
            tokio::select! {
                _ = &mut shutdown => break,
                result = registry.refresh() => {
                    if let Err(e) = result {
                        debug!(error = %e, transient = e.is_transient(), "Poll refresh failed");
                    }
                }
            }
            ticker.reset();
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick(), if active => {
                refresh_now = true;
            }
            event = events.recv() => match event {
                Some(SessionEvent::CredentialStored { origin }) => {
                    debug!(origin = ?origin, "Credential stored, refreshing");
                    active = true;
                    refresh_now = true;
                }
                Some(SessionEvent::CredentialCleared { reason }) => {
                    if active {
                        info!(reason = ?reason, "Credential cleared, polling paused");
                    }
                    active = false;
                    registry.clear();
                }
                None => break,
            },
        }
    }

    debug!("Subdomain polling stopped");
}

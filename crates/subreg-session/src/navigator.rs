//! Where the user is sent after session changes.

use parking_lot::Mutex;
use std::io;
use tracing::{debug, info};
use url::Url;

pub trait Navigator: Send + Sync {
    /// Leave the client for an external page (the provider's sign-in page).
    fn navigate_external(&self, url: &Url) -> io::Result<()>;

    /// Full reload of the landing view after logout. Anything that was
    /// still tied to the old session is dropped.
    fn reload_landing(&self);

    /// Move to the landing view after the OAuth callback was processed.
    fn redirect_landing(&self);
}

/// Opens external pages in the system browser. The landing view is the
/// optional `landing` page; without one, landing navigation is only logged.
pub struct BrowserNavigator {
    landing: Option<Url>,
}

impl BrowserNavigator {
    pub fn new(landing: Option<Url>) -> Self {
        Self { landing }
    }

    fn open_landing(&self) {
        match &self.landing {
            Some(url) => {
                if let Err(e) = open::that(url.as_str()) {
                    debug!(error = %e, "Could not open landing page");
                }
            }
            None => debug!("Returned to landing view"),
        }
    }
}

impl Navigator for BrowserNavigator {
    fn navigate_external(&self, url: &Url) -> io::Result<()> {
        info!(host = url.host_str().unwrap_or_default(), "Opening browser");
        open::that(url.as_str())
    }

    fn reload_landing(&self) {
        self.open_landing();
    }

    fn redirect_landing(&self) {
        self.open_landing();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    External(Url),
    ReloadLanding,
    RedirectLanding,
}

/// Records navigations instead of performing them. Used by tests and by
/// headless callers that read the history afterwards.
#[derive(Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Navigation> {
        self.history.lock().clone()
    }

    pub fn last(&self) -> Option<Navigation> {
        self.history.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_external(&self, url: &Url) -> io::Result<()> {
        self.history.lock().push(Navigation::External(url.clone()));
        Ok(())
    }

    fn reload_landing(&self) {
        self.history.lock().push(Navigation::ReloadLanding);
    }

    fn redirect_landing(&self) {
        self.history.lock().push(Navigation::RedirectLanding);
    }
}

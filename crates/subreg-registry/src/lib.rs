//! Subdomain registry for the subreg client.
//!
//! [`SubdomainRegistry`] caches the signed-in user's subdomains. Deletes are
//! applied to the cache before the server answers and rolled back on
//! failure; creates and updates wait for the server. [`PollHandle`] keeps the
//! cache refreshed while a credential is held.

mod cache;
mod error;
mod poller;
mod registry;
mod types;

pub use error::{RegistryError, RegistryResult};
pub use poller::{PollHandle, DEFAULT_POLL_INTERVAL};
pub use registry::SubdomainRegistry;
pub use types::{Subdomain, SubdomainDraft, SubdomainId, DEFAULT_RECORD_TYPE, DEFAULT_TTL};

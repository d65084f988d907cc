//! Ordered subdomain cache with refresh tickets and pending deletes.
//!
//! Refresh results and local changes share one sequence counter. A refresh
//! result is applied only if no newer refresh was applied before it, and any
//! local change made after its ticket was issued is replayed on top of the
//! server list.

use crate::types::{Subdomain, SubdomainId};
use std::collections::HashMap;

enum Change {
    Deleted(SubdomainId),
    Upserted(Subdomain),
}

struct LocalChange {
    seq: u64,
    change: Change,
}

/// Snapshot taken when an entry is removed optimistically.
struct PendingDelete {
    entry: Subdomain,
    index: usize,
}

#[derive(Default)]
pub(crate) struct Cache {
    entries: Vec<Subdomain>,
    seq: u64,
    /// Ticket of the newest refresh result applied, or the clear that
    /// invalidated every earlier ticket.
    applied: u64,
    pending: HashMap<SubdomainId, PendingDelete>,
    changes: Vec<LocalChange>,
}

impl Cache {
    pub fn entries(&self) -> &[Subdomain] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.pending.is_empty()
    }

    pub fn begin_refresh(&mut self) -> u64 {
        self.next_seq()
    }

    /// Replace the entries with a server list fetched under `ticket`.
    /// Returns false if the result was superseded and dropped.
    pub fn finish_refresh(&mut self, ticket: u64, server: Vec<Subdomain>) -> bool {
        if ticket < self.applied {
            return false;
        }

        let mut entries = server;
        entries.retain(|entry| !self.pending.contains_key(&entry.id));
        for local in self.changes.iter().filter(|local| local.seq > ticket) {
            match &local.change {
                Change::Deleted(id) => entries.retain(|entry| entry.id != *id),
                Change::Upserted(subdomain) => upsert(&mut entries, subdomain.clone()),
            }
        }

        self.entries = entries;
        self.applied = ticket;
        self.changes.retain(|local| local.seq > ticket);
        true
    }

    /// Take `id` out of the list, remembering where it was.
    pub fn remove_pending(&mut self, id: SubdomainId) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let entry = self.entries.remove(index);
        self.pending.insert(id, PendingDelete { entry, index });
        true
    }

    /// The server confirmed the delete.
    pub fn commit_delete(&mut self, id: SubdomainId) {
        self.pending.remove(&id);
        self.entries.retain(|entry| entry.id != id);
        self.record(Change::Deleted(id));
    }

    /// The delete failed: put the entry back where it was. Returns whether
    /// anything was restored.
    pub fn rollback_delete(&mut self, id: SubdomainId) -> bool {
        let Some(PendingDelete { entry, index }) = self.pending.remove(&id) else {
            return false;
        };
        if self.entries.iter().any(|existing| existing.id == id) {
            return false;
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        true
    }

    /// Store a server-confirmed entry: replaced in place if known, else appended.
    pub fn upsert(&mut self, subdomain: Subdomain) {
        upsert(&mut self.entries, subdomain.clone());
        self.record(Change::Upserted(subdomain));
    }

    /// Drop an entry the server no longer knows.
    pub fn forget(&mut self, id: SubdomainId) {
        self.entries.retain(|entry| entry.id != id);
        self.record(Change::Deleted(id));
    }

    /// Empty everything and invalidate refreshes still in flight.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.changes.clear();
        self.applied = self.next_seq();
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn record(&mut self, change: Change) {
        let seq = self.next_seq();
        self.changes.push(LocalChange { seq, change });
    }
}

fn upsert(entries: &mut Vec<Subdomain>, subdomain: Subdomain) {
    match entries.iter_mut().find(|entry| entry.id == subdomain.id) {
        Some(existing) => *existing = subdomain,
        None => entries.push(subdomain),
    }
}

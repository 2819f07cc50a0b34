//! In-flight-request-per-key bookkeeping for browse fetches.
//!
//! Every asynchronous fetch the browser dispatches registers here first. The
//! map guarantees a single outstanding request per key, hands workers a
//! shared cancel flag, and recognizes stale completions by epoch/generation
//! so they can be dropped wherever they land.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::protocol::{FetchKey, FetchTicket};

struct InFlightFetch {
    generation: u64,
    cancel: Arc<AtomicBool>,
}

/// Tracks which fetch keys are in flight and which completions are current.
pub struct FetchCoordinator {
    epoch: u64,
    next_generation: u64,
    in_flight: HashMap<FetchKey, InFlightFetch>,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            next_generation: 0,
            in_flight: HashMap::new(),
        }
    }

    /// Registers a fetch for `key`. Returns `None` when a request for the
    /// same key is already in flight; the caller must not dispatch another.
    pub fn begin(&mut self, key: FetchKey) -> Option<(FetchTicket, Arc<AtomicBool>)> {
        if self.in_flight.contains_key(&key) {
            return None;
        }
        Some(self.register(key))
    }

    /// Registers a fetch for `key`, cancelling any in-flight request for the
    /// same key. Used when newer input replaces older (search queries).
    pub fn supersede(&mut self, key: FetchKey) -> (FetchTicket, Arc<AtomicBool>) {
        if let Some(previous) = self.in_flight.remove(&key) {
            previous.cancel.store(true, Ordering::Relaxed);
        }
        self.register(key)
    }

    fn register(&mut self, key: FetchKey) -> (FetchTicket, Arc<AtomicBool>) {
        self.next_generation += 1;
        let ticket = FetchTicket {
            epoch: self.epoch,
            generation: self.next_generation,
        };
        let cancel = Arc::new(AtomicBool::new(false));
        self.in_flight.insert(
            key,
            InFlightFetch {
                generation: ticket.generation,
                cancel: cancel.clone(),
            },
        );
        (ticket, cancel)
    }

    /// Resolves a completion. Returns `true` when the ticket identifies the
    /// current request for `key`; stale tickets leave the map untouched.
    pub fn complete(&mut self, key: &FetchKey, ticket: FetchTicket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        let current = match self.in_flight.get(key) {
            Some(entry) if entry.generation == ticket.generation => true,
            _ => false,
        };
        if current {
            self.in_flight.remove(key);
        }
        current
    }

    /// Cancels the in-flight request for `key`, if any, without replacing it.
    pub fn cancel(&mut self, key: &FetchKey) {
        if let Some(previous) = self.in_flight.remove(key) {
            previous.cancel.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_in_flight(&self, key: &FetchKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Bumps the epoch and cancels everything in flight. Completions issued
    /// under the previous epoch are rejected by `complete`.
    pub fn invalidate_all(&mut self) {
        self.epoch += 1;
        for entry in self.in_flight.values() {
            entry.cancel.store(true, Ordering::Relaxed);
        }
        self.in_flight.clear();
    }
}

impl Default for FetchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

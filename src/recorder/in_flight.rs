//! Per-fingerprint mutual exclusion for cache misses
//!
//! Two identical requests that miss at the same time would otherwise both go
//! to the network and both write the fixture. The first caller holds the
//! fingerprint's lock while it records; later callers wait, then find the
//! fixture on disk and replay it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::fingerprint::Fingerprint;

/// Set of fingerprints currently being recorded
#[derive(Debug, Default)]
pub struct InFlight {
    locks: DashMap<Fingerprint, Arc<Mutex<()>>>,
}

/// Exclusive hold on one fingerprint, released on drop
///
/// Also exists while waiting, so a caller that gives up still clears the
/// map entry it may have been the last user of.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    fingerprint: Fingerprint,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InFlight {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller holds `fingerprint`, then hold it
    pub async fn acquire(&self, fingerprint: &Fingerprint) -> InFlightGuard<'_> {
        // The map ref must not live across the await
        let lock = Arc::clone(self.locks.entry(fingerprint.clone()).or_default().value());

        let mut held = InFlightGuard {
            owner: self,
            fingerprint: fingerprint.clone(),
            lock,
            guard: None,
        };
        held.guard = Some(Arc::clone(&held.lock).lock_owned().await);
        held
    }

    /// Number of fingerprints held or waited on
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if nothing is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Nobody else waits when only the map and this guard hold the lock
        self.owner.locks.remove_if(&self.fingerprint, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

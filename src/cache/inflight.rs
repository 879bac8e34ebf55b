//! Per-slug mutual exclusion for page regeneration.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Tracks slugs that currently have a regeneration outstanding.
///
/// Background refreshes use [`InFlight::try_acquire`] and give up when the
/// slug is busy. Blocking generations use [`InFlight::acquire`] and queue
/// behind the current holder, so they can re-check the store afterwards
/// instead of querying upstream again.
#[derive(Default, Clone)]
pub struct InFlight {
    slots: Slots,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, slug: &str) -> Option<RegenerationGuard> {
        let slot = self.slot(slug);
        let lock = slot.try_lock_owned().ok()?;
        Some(self.guard(slug, lock))
    }

    pub async fn acquire(&self, slug: &str) -> RegenerationGuard {
        let slot = self.slot(slug);
        let lock = slot.lock_owned().await;
        self.guard(slug, lock)
    }

    pub fn is_busy(&self, slug: &str) -> bool {
        self.slots
            .get(slug)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    fn slot(&self, slug: &str) -> Arc<Mutex<()>> {
        self.slots
            .entry(slug.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn guard(&self, slug: &str, lock: OwnedMutexGuard<()>) -> RegenerationGuard {
        RegenerationGuard {
            slug: slug.to_string(),
            slots: Arc::clone(&self.slots),
            _lock: lock,
        }
    }
}

/// Held for the duration of one regeneration. Dropping it releases the slug.
pub struct RegenerationGuard {
    slug: String,
    slots: Slots,
    _lock: OwnedMutexGuard<()>,
}

impl RegenerationGuard {
    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl Drop for RegenerationGuard {
    fn drop(&mut self) {
        // The map and this guard's lock hold the only references when nobody
        // is queued; anyone waiting keeps the slot alive.
        self.slots
            .remove_if(&self.slug, |_, slot| Arc::strong_count(slot) <= 2);
    }
}

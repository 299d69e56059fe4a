//! Process-wide table of live transfer observers.
//!
//! Each orchestrator call registers one subscription when its engine starts
//! and closes it before its result resolves, so repeated retries never pile
//! up stale observers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tracing::debug;
use url::Url;

static GLOBAL: Lazy<Arc<SubscriptionRegistry>> = Lazy::new(|| Arc::new(SubscriptionRegistry::default()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next:   AtomicU64,
    active: Mutex<HashMap<SubscriptionId, Url>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Registry shared by every orchestrator that was not given its own.
    pub fn global() -> Arc<Self> { Arc::clone(&GLOBAL) }

    pub fn register(self: &Arc<Self>, url: &Url) -> Subscription {
        let id = SubscriptionId(self.next.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, url.clone());
        debug!(id = id.0, url = %url, "subscription registered");
        Subscription {
            id,
            registry: Some(Arc::clone(self)),
        }
    }

    pub fn contains(&self, id: SubscriptionId) -> bool { self.lock().contains_key(&id) }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().remove(&id);
        if let Some(url) = &removed {
            debug!(id = id.0, url = %url, "subscription released");
        }
        removed.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Url>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped registration; removed exactly once by [`Subscription::close`] or
/// on drop, whichever comes first.
#[derive(Debug)]
pub struct Subscription {
    id:       SubscriptionId,
    registry: Option<Arc<SubscriptionRegistry>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId { self.id }

    pub fn is_open(&self) -> bool { self.registry.is_some() }

    /// Returns `true` only on the call that actually removed the entry.
    pub fn close(&mut self) -> bool {
        match self.registry.take() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) { self.close(); }
}

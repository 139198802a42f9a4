//! # Handle Cache
//!
//! Single point of truth mapping tenant identity to a live crypt handle.
//!
//! ## Invalidation
//!
//! Every entry is tagged with the rotation epoch that was current when it was created.
//! When the [`KeyMaterialWatcher`] reports a change the epoch advances and the map is
//! emptied under the same write lock, so readers never see a new epoch next to old
//! entries. Lookups additionally compare the entry's epoch with the current one.
//!
//! ## Single-flight
//!
//! A miss inserts an empty slot for the identity and builds the handle while holding
//! only that slot's lock. Concurrent first requests for the same identity wait on the
//! slot and reuse the outcome, requests for other identities are not blocked. A failed
//! build hands its error to the requests already waiting and then removes the slot, so
//! the next request after it retries.
//!
//! Built entries are only dropped by rotation. Retention between rotations is bounded
//! by the number of distinct tenants the gateway serves.
//!
//! ## Freshness
//!
//! The key files are checked at most once per watcher interval. After a replacement,
//! handles of the previous epoch keep being served until the next check notices it.

pub mod watcher;

pub use watcher::KeyMaterialWatcher;

use crate::crypt::{ConstructionError, HandleFactory, KeyPaths};
use crate::observability::metrics;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Rotation epoch; advanced once per detected key change
pub type Epoch = u64;

/// Shared handle as returned to callers
pub type SharedHandle<F> = Arc<<F as HandleFactory>::Handle>;

/// Identity used when checking key material outside of any tenant request
const KEY_CHECK_IDENTITY: &str = "key-material-check";

/// Per-identity construction slot
///
/// `None` until the first build finishes. A failed outcome is only seen by callers
/// that were already waiting on the slot.
struct Slot<H> {
    epoch: Epoch,
    outcome: Mutex<Option<Result<Arc<H>, ConstructionError>>>,
}

struct CacheState<H> {
    epoch: Epoch,
    entries: HashMap<String, Arc<Slot<H>>>,
}

/// Cache of crypt handles keyed by tenant identity, invalidated on key rotation
pub struct HandleCache<F: HandleFactory> {
    factory: F,
    keys: KeyPaths,
    watcher: KeyMaterialWatcher,
    state: RwLock<CacheState<F::Handle>>,
}

impl<F: HandleFactory> fmt::Debug for HandleCache<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCache")
            .field("keys", &self.keys)
            .field("epoch", &self.epoch())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl<F: HandleFactory> HandleCache<F> {
    /// Create the cache and start watching the key files immediately
    pub fn new(factory: F, keys: KeyPaths, check_interval: Duration) -> Self {
        let watcher = KeyMaterialWatcher::new(keys.all(), check_interval);
        Self::with_watcher(factory, keys, watcher)
    }

    /// Create the cache with an explicit watcher
    pub fn with_watcher(factory: F, keys: KeyPaths, watcher: KeyMaterialWatcher) -> Self {
        Self {
            factory,
            keys,
            watcher,
            state: RwLock::new(CacheState {
                epoch: 0,
                entries: HashMap::new(),
            }),
        }
    }

    /// Key files handles are built from
    pub fn keys(&self) -> &KeyPaths {
        &self.keys
    }

    /// Current rotation epoch
    pub fn epoch(&self) -> Epoch {
        self.read_state().epoch
    }

    /// Number of identities with a built or in-flight handle in the current epoch
    ///
    /// Identities whose construction failed are not counted.
    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    /// Whether no identity has a built or in-flight handle in the current epoch
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a throwaway handle to check that the key material is usable right now
    ///
    /// Bypasses the cache and the watcher, nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the [`ConstructionError`] the factory reports for the current files.
    pub fn verify_key_material(&self) -> Result<(), ConstructionError> {
        self.factory
            .build(&self.keys, KEY_CHECK_IDENTITY)
            .map(drop)
    }

    /// Return the handle for `tenant`, building it on first use in the current epoch
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError`] when `tenant` is empty or the key material cannot
    /// be loaded. Requests waiting on the failed build share its error, later requests
    /// retry.
    pub fn get_or_create(&self, tenant: &str) -> Result<SharedHandle<F>, ConstructionError> {
        if tenant.is_empty() {
            return Err(ConstructionError::empty_identity());
        }

        self.watcher.observe_and(|| self.advance_epoch());

        let slot = self.slot_for(tenant);

        // Single-flight: the first caller builds, the others wait here
        let mut guard = slot.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(Ok(handle)) => {
                debug!(tenant = tenant, epoch = slot.epoch, "Crypt cache hit");
                metrics::increment_cache_hits();
                return Ok(Arc::clone(handle));
            }
            Some(Err(e)) => {
                debug!(tenant = tenant, epoch = slot.epoch, "Joined failed crypt construction");
                return Err(e.clone());
            }
            None => {}
        }

        metrics::increment_cache_misses();
        info!(tenant = tenant, epoch = slot.epoch, "Creating crypt");
        let start = Instant::now();
        match self.factory.build(&self.keys, tenant) {
            Ok(handle) => {
                metrics::observe_handle_construction_duration(start.elapsed().as_secs_f64());
                let handle = Arc::new(handle);
                *guard = Some(Ok(Arc::clone(&handle)));
                Ok(handle)
            }
            Err(e) => {
                warn!(
                    tenant = tenant,
                    reason = e.reason.as_str(),
                    "Failed to create crypt: {}. {}",
                    e.message,
                    e.remediation()
                );
                metrics::increment_handle_construction_errors(e.reason.as_str());
                *guard = Some(Err(e.clone()));
                drop(guard);
                self.remove_slot(tenant, &slot);
                Err(e)
            }
        }
    }

    /// Drop `slot` from the map unless it was already replaced
    fn remove_slot(&self, tenant: &str, slot: &Arc<Slot<F::Handle>>) {
        let mut state = self.write_state();
        if state
            .entries
            .get(tenant)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            state.entries.remove(tenant);
        }
    }

    /// Find the slot for `tenant` in the current epoch, inserting an empty one on miss
    fn slot_for(&self, tenant: &str) -> Arc<Slot<F::Handle>> {
        {
            let state = self.read_state();
            if let Some(slot) = state.entries.get(tenant) {
                if slot.epoch == state.epoch {
                    return Arc::clone(slot);
                }
            }
        }

        let mut state = self.write_state();
        let epoch = state.epoch;
        let slot = state
            .entries
            .entry(tenant.to_string())
            .and_modify(|slot| {
                if slot.epoch != epoch {
                    *slot = Arc::new(Slot::empty(epoch));
                }
            })
            .or_insert_with(|| Arc::new(Slot::empty(epoch)));
        Arc::clone(slot)
    }

    /// Start a new epoch and drop every entry of the previous one
    fn advance_epoch(&self) {
        let mut state = self.write_state();
        state.epoch += 1;
        let dropped = state.entries.len();
        state.entries.clear();
        metrics::increment_key_rotations();
        info!(
            epoch = state.epoch,
            dropped = dropped,
            "Key material rotated, resetting crypt cache"
        );
    }

    // State is only mutated in single assignments, a poisoned lock still holds a
    // consistent map.
    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CacheState<F::Handle>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CacheState<F::Handle>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H> Slot<H> {
    fn empty(epoch: Epoch) -> Self {
        Self {
            epoch,
            outcome: Mutex::new(None),
        }
    }
}

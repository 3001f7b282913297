//! Global store registry for singleton management
//!
//! Ensures only one `Database` instance exists per filesystem path, so that
//! every handle on a file shares its writer lock and subscriber list. An
//! opened store stays registered until [`crate::evict`] removes it, so
//! short-lived handles never trigger a replay of the file.
//!
//! Each path owns a slot. The registry lock is held only to find or create
//! the slot; loading happens inside the slot's once-cell, so a store that is
//! replaying blocks openers of that path and no other.

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::database::Database;

pub(crate) type StoreSlot = Arc<OnceCell<Arc<Database>>>;

/// Global registry of open stores (canonical path -> slot)
static OPEN_STORES: Lazy<Mutex<HashMap<PathBuf, StoreSlot>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Slot for `canonical`, created empty on first use.
pub(crate) fn slot(canonical: &Path) -> StoreSlot {
    let mut registry = OPEN_STORES.lock();
    Arc::clone(
        registry
            .entry(canonical.to_path_buf())
            .or_insert_with(|| Arc::new(OnceCell::new())),
    )
}

/// Forget the slot for `canonical`. Returns whether one existed.
pub(crate) fn remove(canonical: &Path) -> bool {
    OPEN_STORES.lock().remove(canonical).is_some()
}

/// Number of stores currently loaded.
pub fn open_store_count() -> usize {
    OPEN_STORES
        .lock()
        .values()
        .filter(|slot| slot.get().is_some())
        .count()
}

//! Process-wide store accessor.
//!
//! # Invariants
//! - At most one `Store` exists per database path in this process.
//! - The first caller's config wins; later configs for the same path are
//!   ignored apart from the path itself.

use super::store::Store;
use crate::config::StoreConfig;
use log::{debug, warn};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

type StoreSlot = Arc<OnceCell<Arc<Store>>>;

// The map lock only guards slot lookup; opening happens inside the slot so
// a slow open of one path never blocks callers of another.
static STORES: Lazy<Mutex<HashMap<PathBuf, StoreSlot>>> = Lazy::new(Default::default);

/// Returns the shared store for `config.db_path`, opening it on first use.
///
/// Concurrent first calls for one path construct exactly one store.
pub fn shared_store(config: StoreConfig) -> Arc<Store> {
    shared_store_with(config, Store::open)
}

fn shared_store_with(config: StoreConfig, open: impl FnOnce(StoreConfig) -> Store) -> Arc<Store> {
    let slot = slot_for(absolute_path(&config.db_path));

    let mut created = false;
    let store = slot.get_or_init(|| {
        created = true;
        debug!("event=shared_store module=store status=created");
        Arc::new(open(config.clone()))
    });
    if !created && store.config() != &config {
        warn!("event=shared_store module=store status=reused config_mismatch=true");
    }
    Arc::clone(store)
}

fn slot_for(registry_key: PathBuf) -> StoreSlot {
    let mut stores = STORES.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(stores.entry(registry_key).or_default())
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

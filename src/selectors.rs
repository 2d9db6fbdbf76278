//! Memoized selectors over store state.
//!
//! The store replaces its top-level `Arc<StoreState>` on every dispatch, so a
//! single-entry cache keyed on that `Arc`'s identity can never go stale: a
//! new state is a new key. The cached `Arc` is held to keep the address from
//! being reused while it is the key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

use crate::session::{Session, SyncFailure};
use crate::store::StoreState;

type Projection<T> = Box<dyn Fn(&StoreState) -> T + Send + Sync>;

/// Pure projection of store state with a single-entry identity cache
pub struct Selector<T> {
    name: &'static str,
    project: Projection<T>,
    cache: Mutex<Option<(Arc<StoreState>, T)>>,
    recomputations: AtomicU64,
}

impl<T: Clone> Selector<T> {
    pub fn new(
        name: &'static str,
        project: impl Fn(&StoreState) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            project: Box::new(project),
            cache: Mutex::new(None),
            recomputations: AtomicU64::new(0),
        }
    }

    pub fn select(&self, state: &Arc<StoreState>) -> T {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((key, value)) = cache.as_ref() {
            if Arc::ptr_eq(key, state) {
                return value.clone();
            }
        }

        let value = (self.project)(state);
        self.recomputations.fetch_add(1, Ordering::Relaxed);
        trace!("Selector {} recomputed", self.name);
        *cache = Some((state.clone(), value.clone()));
        value
    }

    /// How many times the projection has actually run
    pub fn recompute_count(&self) -> u64 {
        self.recomputations.load(Ordering::Relaxed)
    }
}

/// Current session, absent when signed out
pub fn select_current_user() -> Selector<Option<Session>> {
    Selector::new("current_user", |state| state.user.current_user.clone())
}

pub fn select_is_signed_in() -> Selector<bool> {
    Selector::new("is_signed_in", |state| state.user.current_user.is_some())
}

/// Last session-sync failure on the error channel
pub fn select_sync_error() -> Selector<Option<SyncFailure>> {
    Selector::new("sync_error", |state| state.user.error.clone())
}

/// Props handed to the root composer
#[derive(Clone, Debug, PartialEq)]
pub struct AppProps {
    pub current_user: Option<Session>,
}

/// Structured selection of everything the root composer reads
pub fn select_app_props() -> Selector<AppProps> {
    Selector::new("app_props", |state| AppProps {
        current_user: state.user.current_user.clone(),
    })
}

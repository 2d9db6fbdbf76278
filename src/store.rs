//! Store: the single shared state container.
//!
//! State is held as `Arc<StoreState>` and replaced wholesale on every
//! dispatch, so readers always see a fully-applied state and the `Arc`
//! identity changes exactly when the state changes.
//!
//! Dispatches are applied one at a time: reduce, swap, save, then notify.
//! The next dispatch waits until every listener has seen the previous state,
//! so listeners and the persisted snapshot observe states in dispatch order.
//! A listener may dispatch; its action is queued and applied once the
//! current round of notifications has finished.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

use crate::persist::StatePersistence;
use crate::session::{Session, SyncFailure};

/// User slice of the store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub current_user: Option<Session>,
    /// Last session-sync failure, if any
    #[serde(default)]
    pub error: Option<SyncFailure>,
}

/// Top-level store state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub user: UserState,
}

/// Actions accepted by `Store::dispatch`
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    SetCurrentUser(Session),
    ClearCurrentUser,
    SessionSyncFailed(SyncFailure),
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::SetCurrentUser(_) => "SetCurrentUser",
            Action::ClearCurrentUser => "ClearCurrentUser",
            Action::SessionSyncFailed(_) => "SessionSyncFailed",
        }
    }
}

/// Pure reducer: produces the next state without touching the previous one
pub fn reduce(state: &StoreState, action: &Action) -> StoreState {
    let mut next = state.clone();
    match action {
        Action::SetCurrentUser(session) => {
            next.user.current_user = Some(session.clone());
            next.user.error = None;
        }
        Action::ClearCurrentUser => {
            next.user.current_user = None;
            next.user.error = None;
        }
        Action::SessionSyncFailed(failure) => {
            next.user.error = Some(failure.clone());
        }
    }
    next
}

/// Store change listener
pub type Listener = Arc<dyn Fn(&Arc<StoreState>) + Send + Sync>;

struct StoreInner {
    state: RwLock<Arc<StoreState>>,
    /// Held for a whole dispatch round (reduce, swap, save, notify)
    dispatch_lock: Mutex<()>,
    /// Thread currently running a dispatch round
    dispatching: Mutex<Option<ThreadId>>,
    /// Actions dispatched by listeners during the current round
    queued: Mutex<VecDeque<Action>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    persistence: Option<Arc<dyn StatePersistence>>,
}

/// Shared handle to the store. Cloning shares the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreState::default())
    }
}

impl Store {
    pub fn new(initial: StoreState) -> Self {
        Self::build(initial, None)
    }

    /// Create a store that rehydrates from and saves to `persistence`.
    ///
    /// A failed or empty load starts from the default state.
    pub fn with_persistence(persistence: Arc<dyn StatePersistence>) -> Self {
        let mut initial = StoreState::default();
        match persistence.load() {
            Ok(Some(saved)) => {
                debug!("Rehydrated session snapshot from {}", persistence.name());
                initial.user.current_user = saved.current_user;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to rehydrate store from {}: {}", persistence.name(), e),
        }
        Self::build(initial, Some(persistence))
    }

    fn build(initial: StoreState, persistence: Option<Arc<dyn StatePersistence>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::new(initial)),
                dispatch_lock: Mutex::new(()),
                dispatching: Mutex::new(None),
                queued: Mutex::new(VecDeque::new()),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                persistence,
            }),
        }
    }

    /// Current state snapshot
    pub fn get_state(&self) -> Arc<StoreState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `action`, save the result and notify listeners with it.
    ///
    /// Returns once the action (and anything listeners dispatched in
    /// response) has been applied. Called from a listener, the action is
    /// queued and applied after the current round.
    pub fn dispatch(&self, action: Action) {
        if self.is_dispatching_here() {
            debug!("Queued {} from listener", action.name());
            self.inner
                .queued
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(action);
            return;
        }

        let _serial = self
            .inner
            .dispatch_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _round = RoundGuard::enter(&self.inner);

        let mut next_action = Some(action);
        while let Some(action) = next_action {
            self.apply(&action);
            next_action = self
                .inner
                .queued
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
        }
    }

    fn is_dispatching_here(&self) -> bool {
        *self
            .inner
            .dispatching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(thread::current().id())
    }

    /// One step of a round; caller holds `dispatch_lock`
    fn apply(&self, action: &Action) {
        let next = Arc::new(reduce(&self.get_state(), action));
        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next.clone();
        debug!("Dispatched {}", action.name());

        if let Some(persistence) = &self.inner.persistence {
            if let Err(e) = persistence.save(&next) {
                warn!("Failed to persist store to {}: {}", persistence.name(), e);
            }
        }

        // Snapshot so listeners may subscribe or unsubscribe re-entrantly
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&next);
        }
    }

    /// Register a change listener. Dropping the returned handle unsubscribes.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Arc<StoreState>) + Send + Sync + 'static,
    ) -> StoreSubscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        StoreSubscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Marks the current thread as the dispatcher for the length of a round
struct RoundGuard<'a> {
    inner: &'a StoreInner,
}

impl<'a> RoundGuard<'a> {
    fn enter(inner: &'a StoreInner) -> Self {
        *inner
            .dispatching
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Self { inner }
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        *self
            .inner
            .dispatching
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        // Non-empty only if a listener panicked mid-round
        self.inner
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// RAII handle for a store listener
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct StoreSubscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl StoreSubscription {
    /// Remove the listener. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
        self.store = Weak::new();
    }
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{PersistError, PersistedSession};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn recorder(store: &Store) -> (StoreSubscription, Arc<Mutex<Vec<Option<String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sub = store.subscribe(move |state| {
            let uid = state.user.current_user.as_ref().map(|s| s.uid.clone());
            seen_clone.lock().unwrap().push(uid);
        });
        (sub, seen)
    }

    /// Saves of a signed-in state block until the test releases them
    struct BlockingPersistence {
        saved: Mutex<Vec<Option<String>>>,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl StatePersistence for BlockingPersistence {
        fn name(&self) -> &'static str {
            "blocking"
        }

        fn load(&self) -> Result<Option<PersistedSession>, PersistError> {
            Ok(None)
        }

        fn save(&self, state: &StoreState) -> Result<(), PersistError> {
            let uid = state.user.current_user.as_ref().map(|s| s.uid.clone());
            if uid.is_some() {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            self.saved.lock().unwrap().push(uid);
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_replaces_state_reference() {
        let store = Store::default();
        let before = store.get_state();

        store.dispatch(Action::SetCurrentUser(Session::new("u1")));
        let after = store.get_state();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.user.current_user.is_none());
        assert_eq!(after.user.current_user.as_ref().unwrap().uid, "u1");
    }

    #[test]
    fn test_get_state_is_stable_without_dispatch() {
        let store = Store::default();
        assert!(Arc::ptr_eq(&store.get_state(), &store.get_state()));
    }

    #[test]
    fn test_sync_failure_keeps_current_user() {
        let store = Store::default();
        store.dispatch(Action::SetCurrentUser(Session::new("u1")));
        store.dispatch(Action::SessionSyncFailed(SyncFailure::now("boom")));

        let state = store.get_state();
        assert_eq!(state.user.current_user.as_ref().unwrap().uid, "u1");
        assert_eq!(state.user.error.as_ref().unwrap().message, "boom");

        store.dispatch(Action::ClearCurrentUser);
        let state = store.get_state();
        assert!(state.user.current_user.is_none());
        assert!(state.user.error.is_none());
    }

    #[test]
    fn test_listeners_see_new_state() {
        let store = Store::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = store.subscribe(move |state| {
            let uid = state.user.current_user.as_ref().map(|s| s.uid.clone());
            seen_clone.lock().unwrap().push(uid);
        });

        store.dispatch(Action::SetCurrentUser(Session::new("a")));
        store.dispatch(Action::SetCurrentUser(Session::new("b")));
        store.dispatch(Action::ClearCurrentUser);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("a".to_string()), Some("b".to_string()), None]
        );
    }

    #[test]
    fn test_drop_unsubscribes() {
        let store = Store::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let sub = store.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        store.dispatch(Action::ClearCurrentUser);
        drop(sub);
        store.dispatch(Action::ClearCurrentUser);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_twice_is_harmless() {
        let store = Store::default();
        let mut sub = store.subscribe(|_| {});
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_dispatch() {
        let store = Store::default();
        let inner = store.clone();
        let _sub = store.subscribe(move |state| {
            if state.user.error.is_some() {
                inner.dispatch(Action::ClearCurrentUser);
            }
        });

        store.dispatch(Action::SetCurrentUser(Session::new("u1")));
        store.dispatch(Action::SessionSyncFailed(SyncFailure::now("x")));

        let state = store.get_state();
        assert!(state.user.current_user.is_none());
        assert!(state.user.error.is_none());
    }

    #[test]
    fn test_overlapping_dispatches_save_and_notify_in_order() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let persistence = Arc::new(BlockingPersistence {
            saved: Mutex::new(Vec::new()),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let store = Store::with_persistence(persistence.clone());
        let (_sub, seen) = recorder(&store);

        let sign_in = {
            let store = store.clone();
            thread::spawn(move || store.dispatch(Action::SetCurrentUser(Session::new("alice"))))
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Sign-out arrives while the sign-in is still being saved
        let sign_out = {
            let store = store.clone();
            thread::spawn(move || store.dispatch(Action::ClearCurrentUser))
        };
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        sign_in.join().unwrap();
        sign_out.join().unwrap();

        assert!(store.get_state().user.current_user.is_none());
        assert_eq!(
            *persistence.saved.lock().unwrap(),
            vec![Some("alice".to_string()), None]
        );
        assert_eq!(*seen.lock().unwrap(), vec![Some("alice".to_string()), None]);
    }

    #[test]
    fn test_listener_dispatch_waits_for_current_round() {
        let store = Store::default();
        let inner = store.clone();
        let _first = store.subscribe(move |state| {
            if state.user.current_user.as_ref().is_some_and(|s| s.uid == "a") {
                inner.dispatch(Action::SetCurrentUser(Session::new("b")));
            }
        });
        let (_second, seen) = recorder(&store);

        store.dispatch(Action::SetCurrentUser(Session::new("a")));

        // Every listener sees "a" before anyone sees "b"
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("a".to_string()), Some("b".to_string())]
        );
        assert_eq!(store.get_state().user.current_user.as_ref().unwrap().uid, "b");
    }
}

//! SessionObserver - keeps the store's session slice in sync with the auth backend
//!
//! Subscribes once, translates every backend notification into a store
//! action and releases the subscription on `stop()` or drop. Backend errors
//! land on the store's error channel; the observer stays subscribed and does
//! not retry a failed subscription.

use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{AuthBackend, AuthListener, AuthNotification, AuthSubscription, BackendError};
use crate::session::SyncFailure;
use crate::store::{Action, Store};

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("failed to subscribe to auth backend: {0}")]
    Subscribe(#[from] BackendError),
}

/// Observable lifecycle of the observer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverStatus {
    Idle,
    Starting,
    Running,
    Stopped,
    /// Subscription failed; the observer will not subscribe again
    Failed,
}

enum Lifecycle {
    Idle,
    Starting,
    Running(Box<dyn AuthSubscription>),
    Stopped,
    Failed,
}

impl Lifecycle {
    fn status(&self) -> ObserverStatus {
        match self {
            Lifecycle::Idle => ObserverStatus::Idle,
            Lifecycle::Starting => ObserverStatus::Starting,
            Lifecycle::Running(_) => ObserverStatus::Running,
            Lifecycle::Stopped => ObserverStatus::Stopped,
            Lifecycle::Failed => ObserverStatus::Failed,
        }
    }
}

pub struct SessionObserver {
    backend: Arc<dyn AuthBackend>,
    store: Store,
    lifecycle: Mutex<Lifecycle>,
    /// Cancelled on release; the backend listener checks it before writing
    released: CancellationToken,
}

impl SessionObserver {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Store) -> Self {
        Self {
            backend,
            store,
            lifecycle: Mutex::new(Lifecycle::Idle),
            released: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> ObserverStatus {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status()
    }

    /// Subscribe to the backend. Only the first call does anything.
    pub async fn start(&self) -> Result<(), ObserverError> {
        {
            let mut lifecycle = self
                .lifecycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !matches!(*lifecycle, Lifecycle::Idle) {
                debug!(
                    "Session observer start ignored (status: {:?})",
                    lifecycle.status()
                );
                return Ok(());
            }
            *lifecycle = Lifecycle::Starting;
        }

        let backend = self.backend.name();
        info!("Session observer subscribing to {} auth backend", backend);

        let store = self.store.clone();
        let released = self.released.clone();
        let listener: AuthListener = Arc::new(move |notification| {
            if released.is_cancelled() {
                debug!("Session observer released, dropping notification");
                return;
            }
            apply_notification(&store, notification);
        });

        match self.backend.subscribe(listener).await {
            Ok(mut subscription) => {
                let mut lifecycle = self
                    .lifecycle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if matches!(*lifecycle, Lifecycle::Starting) {
                    *lifecycle = Lifecycle::Running(subscription);
                    info!("Session observer running");
                } else {
                    // stop() won the race while we were subscribing
                    subscription.unsubscribe();
                    debug!("Session observer stopped during start, released subscription");
                }
                Ok(())
            }
            Err(e) => {
                warn!("Session sync failure: {}", e);
                let still_starting = {
                    let mut lifecycle = self
                        .lifecycle
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    let starting = matches!(*lifecycle, Lifecycle::Starting);
                    if starting {
                        *lifecycle = Lifecycle::Failed;
                    }
                    starting
                };
                // Released while subscribing: no store writes after stop()
                if still_starting && !self.released.is_cancelled() {
                    self.store
                        .dispatch(Action::SessionSyncFailed(SyncFailure::now(e.to_string())));
                } else {
                    debug!("Session observer stopped during start, dropping failure");
                }
                Err(ObserverError::Subscribe(e))
            }
        }
    }

    /// Release the backend subscription. Idempotent.
    pub fn stop(&self) {
        self.released.cancel();
        let previous = {
            let mut lifecycle = self
                .lifecycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if matches!(*lifecycle, Lifecycle::Stopped | Lifecycle::Failed) {
                return;
            }
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        };
        if let Lifecycle::Running(mut subscription) = previous {
            subscription.unsubscribe();
            info!("Session observer stopped");
        }
    }
}

impl Drop for SessionObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn apply_notification(store: &Store, notification: AuthNotification) {
    match notification {
        AuthNotification::SignedIn(session) => {
            debug!("Session established for {}", session.uid);
            store.dispatch(Action::SetCurrentUser(session));
        }
        AuthNotification::SignedOut => {
            debug!("Session cleared");
            store.dispatch(Action::ClearCurrentUser);
        }
        AuthNotification::Error(message) => {
            warn!("Session sync failure: {}", message);
            store.dispatch(Action::SessionSyncFailed(SyncFailure::now(message)));
        }
    }
}

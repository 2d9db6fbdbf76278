//! Authentication backend channel.
//!
//! The backend is an external collaborator; this module only fixes the
//! contract the session observer consumes: subscribe a listener, receive
//! two-valued session notifications (plus errors), release the
//! subscription. `LocalAuthBackend` is an in-process implementation used by
//! the app shell and by tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, info};

use crate::session::Session;

/// Notification delivered by the backend on every session change
#[derive(Clone, Debug, PartialEq)]
pub enum AuthNotification {
    SignedIn(Session),
    SignedOut,
    /// The backend failed to determine the session
    Error(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("auth backend unavailable: {0}")]
    Unavailable(String),
    #[error("subscription rejected: {0}")]
    Rejected(String),
}

/// Callback registered with the backend
pub type AuthListener = Arc<dyn Fn(AuthNotification) + Send + Sync>;

/// Live registration with the backend
pub trait AuthSubscription: Send {
    /// Stop delivering notifications. Must be idempotent.
    fn unsubscribe(&mut self);
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Backend name for log lines
    fn name(&self) -> &'static str;

    /// Register `listener` for session-change notifications
    async fn subscribe(
        &self,
        listener: AuthListener,
    ) -> Result<Box<dyn AuthSubscription>, BackendError>;
}

struct LocalInner {
    listeners: Mutex<Vec<(u64, AuthListener)>>,
    current: Mutex<Option<Session>>,
    next_id: AtomicU64,
    subscribe_calls: AtomicUsize,
    available: AtomicBool,
}

/// In-process auth backend.
///
/// Like the hosted backends it mirrors, a new subscriber immediately receives
/// the current session state.
#[derive(Clone)]
pub struct LocalAuthBackend {
    inner: Arc<LocalInner>,
}

impl Default for LocalAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LocalInner {
                listeners: Mutex::new(Vec::new()),
                current: Mutex::new(None),
                next_id: AtomicU64::new(0),
                subscribe_calls: AtomicUsize::new(0),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Make subsequent `subscribe` calls fail (or succeed again)
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn sign_in(&self, session: Session) {
        info!("Local auth: signed in {}", session.uid);
        let mut current = self.lock_current();
        *current = Some(session.clone());
        self.emit(AuthNotification::SignedIn(session));
    }

    pub fn sign_out(&self) {
        info!("Local auth: signed out");
        let mut current = self.lock_current();
        *current = None;
        self.emit(AuthNotification::SignedOut);
    }

    /// Deliver an error notification without changing the session
    pub fn report_error(&self, message: impl Into<String>) {
        let _current = self.lock_current();
        self.emit(AuthNotification::Error(message.into()));
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total `subscribe` calls, successful or not
    pub fn subscribe_calls(&self) -> usize {
        self.inner.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Session lock. Held while notifying, so every subscriber sees changes
    /// in the order they were made; listeners must not call back into the
    /// backend.
    fn lock_current(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `listener` and hand it the current session before any later change
    fn register(&self, listener: AuthListener) -> u64 {
        let current = self.lock_current();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener.clone()));

        let initial = match current.as_ref() {
            Some(session) => AuthNotification::SignedIn(session.clone()),
            None => AuthNotification::SignedOut,
        };
        listener(initial);
        id
    }

    fn emit(&self, notification: AuthNotification) {
        let listeners: Vec<AuthListener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        debug!("Local auth: notifying {} listener(s)", listeners.len());
        for listener in listeners {
            listener(notification.clone());
        }
    }
}

#[async_trait]
impl AuthBackend for LocalAuthBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn subscribe(
        &self,
        listener: AuthListener,
    ) -> Result<Box<dyn AuthSubscription>, BackendError> {
        self.inner.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("local backend offline".into()));
        }

        let id = self.register(listener);

        Ok(Box::new(LocalSubscription {
            id,
            backend: Arc::downgrade(&self.inner),
        }))
    }
}

struct LocalSubscription {
    id: u64,
    backend: Weak<LocalInner>,
}

impl AuthSubscription for LocalSubscription {
    fn unsubscribe(&mut self) {
        if let Some(inner) = self.backend.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
        self.backend = Weak::new();
    }
}

impl Drop for LocalSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

//! Lazy view loader.
//!
//! View modules are fetched on first use. All callers asking for the same
//! view share one in-flight future, and the outcome (success or failure) is
//! kept for the lifetime of the loader. Nothing is retried.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::routes::ViewRef;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ViewLoadError {
    #[error("no view module registered for {0}")]
    Unregistered(ViewRef),
    #[error("failed to load view {view}: {message}")]
    Fetch { view: ViewRef, message: String },
}

/// A loadable view module
#[async_trait]
pub trait ViewModule<V>: Send + Sync {
    async fn load(&self) -> Result<V, ViewLoadError>;
}

/// `ViewModule` backed by an async closure
pub struct AsyncModule<F> {
    load: F,
}

/// Wrap an async closure as a view module
pub fn module<V, F, Fut>(load: F) -> AsyncModule<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, ViewLoadError>> + Send + 'static,
{
    AsyncModule { load }
}

#[async_trait]
impl<V, F, Fut> ViewModule<V> for AsyncModule<F>
where
    V: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, ViewLoadError>> + Send + 'static,
{
    async fn load(&self) -> Result<V, ViewLoadError> {
        (self.load)().await
    }
}

/// Loading slot state read by the composing layer
#[derive(Clone, Debug, PartialEq)]
pub enum LoadState<V> {
    /// Never requested
    Idle,
    Pending,
    Ready(V),
    Failed(ViewLoadError),
}

type LoadFuture<V> = Shared<BoxFuture<'static, Result<V, ViewLoadError>>>;

enum Slot<V: Clone> {
    Pending(LoadFuture<V>),
    Ready(V),
    Failed(ViewLoadError),
}

pub struct LazyViewLoader<V: Clone> {
    modules: HashMap<ViewRef, Arc<dyn ViewModule<V>>>,
    slots: Mutex<HashMap<ViewRef, Slot<V>>>,
    fetches: AtomicUsize,
}

impl<V: Clone + Send + Sync + 'static> Default for LazyViewLoader<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> LazyViewLoader<V> {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Bind `view` to its module. Later registrations replace earlier ones.
    pub fn register(mut self, view: ViewRef, module: impl ViewModule<V> + 'static) -> Self {
        self.modules.insert(view, Arc::new(module));
        self
    }

    pub fn is_registered(&self, view: ViewRef) -> bool {
        self.modules.contains_key(&view)
    }

    /// Number of module fetches actually started
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Current slot state without starting or driving a fetch
    pub fn peek(&self, view: ViewRef) -> LoadState<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let settled = match slots.get(&view) {
            None => return LoadState::Idle,
            Some(Slot::Ready(v)) => return LoadState::Ready(v.clone()),
            Some(Slot::Failed(e)) => return LoadState::Failed(e.clone()),
            Some(Slot::Pending(fut)) => match fut.peek() {
                Some(result) => result.clone(),
                None => return LoadState::Pending,
            },
        };

        // Settled while nobody was awaiting it; record the outcome
        match settled {
            Ok(v) => {
                slots.insert(view, Slot::Ready(v.clone()));
                LoadState::Ready(v)
            }
            Err(e) => {
                slots.insert(view, Slot::Failed(e.clone()));
                LoadState::Failed(e)
            }
        }
    }

    /// Resolve `view`, fetching its module at most once
    pub async fn load(&self, view: ViewRef) -> Result<V, ViewLoadError> {
        let fut = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get(&view) {
                Some(Slot::Ready(v)) => return Ok(v.clone()),
                Some(Slot::Failed(e)) => return Err(e.clone()),
                Some(Slot::Pending(fut)) => fut.clone(),
                None => {
                    let Some(module) = self.modules.get(&view).cloned() else {
                        let err = ViewLoadError::Unregistered(view);
                        error!("{}", err);
                        slots.insert(view, Slot::Failed(err.clone()));
                        return Err(err);
                    };
                    info!("Fetching view module {}", view);
                    self.fetches.fetch_add(1, Ordering::SeqCst);
                    let fut = async move { module.load().await }.boxed().shared();
                    slots.insert(view, Slot::Pending(fut.clone()));
                    fut
                }
            }
        };

        let result = fut.await;

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(slots.get(&view), Some(Slot::Pending(_))) {
            match &result {
                Ok(v) => {
                    debug!("View module {} ready", view);
                    slots.insert(view, Slot::Ready(v.clone()));
                }
                Err(e) => {
                    error!("View module {} failed: {}", view, e);
                    slots.insert(view, Slot::Failed(e.clone()));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::views;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Module that waits for a signal and counts its loads
    struct GatedModule {
        loads: Arc<AtomicUsize>,
        gate: Arc<Notify>,
        fail: bool,
    }

    #[async_trait]
    impl ViewModule<&'static str> for GatedModule {
        async fn load(&self) -> Result<&'static str, ViewLoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if self.fail {
                Err(ViewLoadError::Fetch {
                    view: views::SHOP,
                    message: "chunk 404".into(),
                })
            } else {
                Ok("shop page")
            }
        }
    }

    fn gated(fail: bool) -> (LazyViewLoader<&'static str>, Arc<AtomicUsize>, Arc<Notify>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let loader = LazyViewLoader::new().register(
            views::SHOP,
            GatedModule {
                loads: loads.clone(),
                gate: gate.clone(),
                fail,
            },
        );
        (loader, loads, gate)
    }

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let (loader, loads, gate) = gated(false);
        let loader = Arc::new(loader);

        let a = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(views::SHOP).await }
        });
        let b = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(views::SHOP).await }
        });

        // Let both tasks reach the shared future
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(loader.peek(views::SHOP), LoadState::Pending);
        gate.notify_one();

        assert_eq!(a.await.unwrap(), Ok("shop page"));
        assert_eq!(b.await.unwrap(), Ok("shop page"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(loader.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_ready_view_is_cached() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let loader = LazyViewLoader::new().register(
            views::HOME,
            module(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok("home page") }
            }),
        );

        assert_eq!(loader.peek(views::HOME), LoadState::Idle);
        assert_eq!(loader.load(views::HOME).await, Ok("home page"));
        assert_eq!(loader.load(views::HOME).await, Ok("home page"));
        assert_eq!(loader.peek(views::HOME), LoadState::Ready("home page"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_cached_not_retried() {
        let (loader, loads, gate) = gated(true);
        gate.notify_one();

        let first = loader.load(views::SHOP).await;
        assert!(matches!(first, Err(ViewLoadError::Fetch { .. })));

        let second = loader.load(views::SHOP).await;
        assert_eq!(first, second);
        assert!(matches!(loader.peek(views::SHOP), LoadState::Failed(_)));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_view() {
        let loader: LazyViewLoader<&'static str> = LazyViewLoader::new();
        let err = loader.load(views::CHECKOUT).await.unwrap_err();
        assert_eq!(err, ViewLoadError::Unregistered(views::CHECKOUT));
        assert_eq!(loader.fetch_count(), 0);
    }
}

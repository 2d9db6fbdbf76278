//! Storefront - the root composer
//!
//! Owns the wiring between the store, the session observer, the route
//! table, the lazy loader and the failure boundary. Rendering produces a
//! `Frame`: the header (always there) and the body produced inside the
//! boundary. The UI layer turns frames into elements.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::auth::AuthBackend;
use crate::boundary::{FailureBoundary, FailureRecord, Guarded, ViewError};
use crate::config::ShellConfig;
use crate::loader::{LazyViewLoader, LoadState};
use crate::navigation::Navigator;
use crate::observer::{ObserverError, ObserverStatus, SessionObserver};
use crate::routes::{normalize_path, RouteMatch, RouteTable, ViewDescriptor, ViewRef};
use crate::selectors::{select_app_props, select_sync_error, AppProps, Selector};
use crate::session::{Session, SyncFailure};
use crate::store::{Store, StoreSubscription};

/// Header model; rendered outside the boundary
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeaderModel {
    pub current_user: Option<Session>,
    pub sync_error: Option<SyncFailure>,
}

/// Body produced inside the boundary
#[derive(Clone, Debug, PartialEq)]
pub enum Body<V> {
    /// View code not loaded yet; render the loading fallback
    Pending { view: ViewRef },
    Ready { descriptor: ViewDescriptor, view: V },
    NotFound { path: String },
    /// Boundary fallback
    Failed(FailureRecord),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame<V> {
    pub header: HeaderModel,
    pub body: Body<V>,
}

/// Collaborators handed to `Storefront::new`
pub struct StorefrontParts<V: Clone> {
    pub store: Store,
    pub backend: Arc<dyn AuthBackend>,
    pub navigator: Arc<dyn Navigator>,
    pub routes: RouteTable,
    pub loader: LazyViewLoader<V>,
    pub config: ShellConfig,
}

enum Mount {
    Unmounted,
    Mounted(#[allow(dead_code)] StoreSubscription),
    TornDown,
}

struct ShellInner<V: Clone> {
    store: Store,
    observer: SessionObserver,
    navigator: Arc<dyn Navigator>,
    routes: RouteTable,
    loader: LazyViewLoader<V>,
    boundary: FailureBoundary,
    app_props: Selector<AppProps>,
    sync_error: Selector<Option<SyncFailure>>,
    redirect_limit: usize,
    mount: Mutex<Mount>,
}

/// Shared handle to the composed application
pub struct Storefront<V: Clone> {
    inner: Arc<ShellInner<V>>,
}

impl<V: Clone> Clone for Storefront<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Storefront<V> {
    pub fn new(parts: StorefrontParts<V>) -> Self {
        let observer = SessionObserver::new(parts.backend, parts.store.clone());
        Self {
            inner: Arc::new(ShellInner {
                store: parts.store,
                observer,
                navigator: parts.navigator,
                routes: parts.routes,
                loader: parts.loader,
                boundary: FailureBoundary::new("routes"),
                app_props: select_app_props(),
                sync_error: select_sync_error(),
                redirect_limit: parts.config.redirect_limit,
                mount: Mutex::new(Mount::Unmounted),
            }),
        }
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    pub fn boundary(&self) -> &FailureBoundary {
        &self.inner.boundary
    }

    pub fn loader(&self) -> &LazyViewLoader<V> {
        &self.inner.loader
    }

    pub fn observer_status(&self) -> ObserverStatus {
        self.inner.observer.status()
    }

    /// Start session sync. Only the first call has any effect.
    ///
    /// A subscription failure is returned for logging; the shell keeps
    /// working with whatever session the store already holds.
    pub async fn mount(&self) -> Result<(), ObserverError> {
        {
            let mut mount = self
                .inner
                .mount
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !matches!(*mount, Mount::Unmounted) {
                debug!("Storefront already mounted");
                return Ok(());
            }
            *mount = Mount::Mounted(self.watch_session());
        }
        info!("Storefront mounted");
        self.inner.observer.start().await
    }

    /// Stop session sync and drop the store watch. Idempotent.
    pub fn unmount(&self) {
        self.inner.observer.stop();
        let previous = std::mem::replace(
            &mut *self
                .inner
                .mount
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            Mount::TornDown,
        );
        if matches!(previous, Mount::Mounted(_)) {
            info!("Storefront unmounted");
        }
    }

    /// Re-run the current path's guard whenever the store changes, so a
    /// session arriving while the sign-in page is up still redirects.
    fn watch_session(&self) -> StoreSubscription {
        let routes = self.inner.routes.clone();
        let navigator = self.inner.navigator.clone();
        self.inner.store.subscribe(move |state| {
            let path = navigator.current_path();
            if let RouteMatch::Redirect { from, to } =
                routes.match_route(&path, state.user.current_user.as_ref())
            {
                info!("Session changed on {}, redirecting to {}", from, to);
                navigator.redirect(&to);
            }
        })
    }

    /// Produce the frame for `path`
    pub fn render(&self, path: &str) -> Frame<V> {
        let state = self.inner.store.get_state();
        let props = self.inner.app_props.select(&state);
        let header = HeaderModel {
            current_user: props.current_user.clone(),
            sync_error: self.inner.sync_error.select(&state),
        };

        let body = match self
            .inner
            .boundary
            .guard(path, || self.produce_body(path, props.current_user.as_ref()))
        {
            Guarded::Rendered(body) => body,
            Guarded::Fallback(record) => Body::Failed(record),
        };

        Frame { header, body }
    }

    fn produce_body(&self, path: &str, session: Option<&Session>) -> Result<Body<V>, ViewError> {
        let descriptor = match self.resolve_route(path, session, true)? {
            Some(descriptor) => descriptor,
            None => {
                return Ok(Body::NotFound {
                    path: normalize_path(path),
                })
            }
        };

        match self.inner.loader.peek(descriptor.view) {
            LoadState::Ready(view) => Ok(Body::Ready { descriptor, view }),
            LoadState::Idle | LoadState::Pending => Ok(Body::Pending {
                view: descriptor.view,
            }),
            LoadState::Failed(e) => Err(e.into()),
        }
    }

    /// Follow redirects to the entry that renders `path`
    fn resolve_route(
        &self,
        path: &str,
        session: Option<&Session>,
        navigate: bool,
    ) -> Result<Option<ViewDescriptor>, ViewError> {
        let mut path = normalize_path(path);
        for _ in 0..=self.inner.redirect_limit {
            match self.inner.routes.match_route(&path, session) {
                RouteMatch::Render(descriptor) => return Ok(Some(descriptor)),
                RouteMatch::NotFound { .. } => return Ok(None),
                RouteMatch::Redirect { to, .. } => {
                    if navigate {
                        self.inner.navigator.redirect(&to);
                    }
                    path = to;
                }
            }
        }
        Err(ViewError::Render(format!(
            "redirect limit ({}) exceeded at {}",
            self.inner.redirect_limit, path
        )))
    }

    /// Load the view code for `path` so the next render leaves the pending state
    pub async fn prepare(&self, path: &str) -> Result<(), ViewError> {
        let state = self.inner.store.get_state();
        let descriptor = match self.resolve_route(path, state.user.current_user.as_ref(), false) {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => return Ok(()),
            Err(e) => return Err(self.inner.boundary.record(path, e).error),
        };

        if let Err(e) = self.inner.loader.load(descriptor.view).await {
            warn!("View for {} failed to load: {}", path, e);
            return Err(self.inner.boundary.record(path, e.into()).error);
        }
        Ok(())
    }

    /// Report a failure caught by the UI layer while rendering the body
    pub fn record_render_failure(&self, subtree: &str, message: impl Into<String>) -> FailureRecord {
        self.inner
            .boundary
            .record(subtree, ViewError::Render(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuthBackend;
    use crate::loader::{module, ViewLoadError};
    use crate::navigation::MemoryNavigator;
    use crate::routes::views;

    struct Fixture {
        backend: LocalAuthBackend,
        navigator: Arc<MemoryNavigator>,
        shell: Storefront<&'static str>,
    }

    fn fixture(start: &str) -> Fixture {
        let backend = LocalAuthBackend::new();
        let navigator = Arc::new(MemoryNavigator::new(start));
        let loader = LazyViewLoader::new()
            .register(views::HOME, module(|| async { Ok("home") }))
            .register(views::SHOP, module(|| async { Ok("shop") }))
            .register(views::SIGN_IN, module(|| async { Ok("signin") }))
            .register(views::NOT_FOUND, module(|| async { Ok("not found") }))
            .register(
                views::CHECKOUT,
                module(|| async {
                    Err(ViewLoadError::Fetch {
                        view: views::CHECKOUT,
                        message: "network down".into(),
                    })
                }),
            );
        let shell = Storefront::new(StorefrontParts {
            store: Store::default(),
            backend: Arc::new(backend.clone()),
            navigator: navigator.clone(),
            routes: RouteTable::storefront("/signin", "/"),
            loader,
            config: ShellConfig::default(),
        });
        Fixture {
            backend,
            navigator,
            shell,
        }
    }

    #[tokio::test]
    async fn test_pending_then_ready() {
        let f = fixture("/shop");
        assert_eq!(
            f.shell.render("/shop").body,
            Body::Pending { view: views::SHOP }
        );

        f.shell.prepare("/shop").await.unwrap();
        match f.shell.render("/shop/hats").body {
            Body::Ready { view, descriptor } => {
                assert_eq!(view, "shop");
                assert_eq!(descriptor.pattern, "/shop");
            }
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mount_twice_subscribes_once() {
        let f = fixture("/");
        f.shell.mount().await.unwrap();
        f.shell.mount().await.unwrap();
        f.shell.render("/");
        f.shell.render("/");

        assert_eq!(f.backend.subscribe_calls(), 1);
        assert_eq!(f.shell.observer_status(), ObserverStatus::Running);
    }

    #[tokio::test]
    async fn test_signed_in_user_is_redirected_from_signin() {
        let f = fixture("/signin");
        f.shell.mount().await.unwrap();
        f.shell.prepare("/").await.unwrap();
        f.backend.sign_in(Session::new("u1"));

        let frame = f.shell.render("/signin");
        assert!(matches!(frame.body, Body::Ready { view: "home", .. }));
        assert_eq!(f.navigator.current_path(), "/");
        assert_eq!(frame.header.current_user.map(|u| u.uid), Some("u1".into()));
    }

    #[tokio::test]
    async fn test_session_change_redirects_while_on_signin() {
        let f = fixture("/signin");
        f.shell.mount().await.unwrap();
        f.shell.prepare("/signin").await.unwrap();
        assert!(matches!(
            f.shell.render("/signin").body,
            Body::Ready { view: "signin", .. }
        ));

        // No navigation happens; the session change alone must move us
        f.backend.sign_in(Session::new("u1"));
        assert_eq!(f.navigator.current_path(), "/");
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_but_header_stays() {
        let f = fixture("/checkout");
        f.shell.mount().await.unwrap();
        f.backend.sign_in(Session::new("u1"));

        assert!(f.shell.prepare("/checkout").await.is_err());
        let frame = f.shell.render("/checkout");
        assert!(matches!(frame.body, Body::Failed(ref r) if r.subtree == "/checkout"));
        assert!(frame.header.current_user.is_some());

        // The boundary does not recover on its own
        f.shell.prepare("/").await.unwrap();
        assert!(matches!(f.shell.render("/").body, Body::Failed(_)));
    }

    #[tokio::test]
    async fn test_unmount_stops_session_sync() {
        let f = fixture("/");
        f.shell.mount().await.unwrap();
        f.shell.unmount();
        f.shell.unmount();

        f.backend.sign_in(Session::new("late"));
        assert!(f.shell.store().get_state().user.current_user.is_none());
        assert_eq!(f.backend.subscriber_count(), 0);
        assert_eq!(f.shell.store().listener_count(), 0);
    }

    #[test]
    fn test_redirect_loop_is_contained() {
        let backend = LocalAuthBackend::new();
        let loop_guard = crate::routes::Guard::new("loop", |_| {
            crate::routes::GateState::Redirecting {
                to: "/a".to_string(),
            }
        });
        let shell: Storefront<&'static str> = Storefront::new(StorefrontParts {
            store: Store::default(),
            backend: Arc::new(backend),
            navigator: Arc::new(MemoryNavigator::default()),
            routes: RouteTable::new(vec![
                crate::routes::RouteEntry::exact("/a", views::HOME).guarded(loop_guard)
            ]),
            loader: LazyViewLoader::new(),
            config: ShellConfig::default(),
        });

        let frame = shell.render("/a");
        assert!(matches!(frame.body, Body::Failed(ref r) if matches!(r.error, ViewError::Render(_))));
    }
}

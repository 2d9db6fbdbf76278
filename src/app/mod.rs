//! Dioxus application entry point.
//!
//! The `App` component owns one `Storefront` for its whole lifetime and
//! turns its frames into elements. Session sync starts once on mount and is
//! released when the component is dropped.

use dioxus::prelude::*;
use std::rc::Rc;
use std::sync::Arc;

pub mod components;
pub mod navigator;
pub mod pages;

use crate::auth::LocalAuthBackend;
use crate::boundary::ViewError;
use crate::config::ShellConfig;
use crate::loader::{module, LazyViewLoader};
use crate::routes::{views, RouteTable};
use crate::shell::{Body, Storefront, StorefrontParts};
use crate::store::Store;
use components::{ErrorFallback, Header, Spinner};
use navigator::{initial_path, AppServices, SignalNavigator};
use pages::Page;

/// Root app component
#[component]
pub fn App() -> Element {
    let path = use_signal_sync(initial_path);
    let revision = use_signal_sync(|| 0u64);

    let auth = use_hook(LocalAuthBackend::new);
    let navigator = SignalNavigator::new(path);
    let shell = use_hook(|| build_storefront(auth.clone(), navigator));

    // Shared with pages and the header (sign in/out, links)
    use_context_provider(|| AppServices {
        auth: auth.clone(),
        navigator,
    });

    // Store changes re-render the app
    use_hook(|| {
        Rc::new(shell.store().subscribe(move |_| {
            let mut revision = revision;
            *revision.write() += 1;
        }))
    });

    // Subscribe to the auth backend exactly once, however often we re-render
    use_hook(|| {
        let shell = shell.clone();
        spawn(async move {
            if let Err(e) = shell.mount().await {
                tracing::warn!("Session sync unavailable: {}", e);
            }
        });
    });

    use_drop({
        let shell = shell.clone();
        move || shell.unmount()
    });

    // Fetch the view code for the current path; resolves the loading slot
    let loaded = use_resource({
        let shell = shell.clone();
        move || {
            let current = path.read().clone();
            let _ = *revision.read();
            prepare_view(shell.clone(), current)
        }
    });

    let _ = *revision.read();
    let _ = loaded.read();
    let current = path.read().clone();
    let frame = shell.render(&current);

    let body = match frame.body {
        Body::Pending { .. } => rsx! { Spinner {} },
        Body::Ready { view, descriptor } => {
            let shell = shell.clone();
            rsx! {
                ErrorBoundary {
                    handle_error: move |_errors: ErrorContext| {
                        shell.record_render_failure(&descriptor.path, "page failed to render");
                        rsx! { ErrorFallback {} }
                    },
                    {view.render()}
                }
            }
        }
        Body::NotFound { .. } => Page::NotFound.render(),
        Body::Failed(record) => {
            tracing::debug!("Rendering fallback for {}", record.subtree);
            rsx! { ErrorFallback {} }
        }
    };

    rsx! {
        Header {
            current_user: frame.header.current_user.clone(),
            sync_error: frame.header.sync_error.clone(),
        }
        main { class: "max-w-7xl mx-auto px-4 sm:px-6 lg:px-8 mt-4",
            {body}
        }
    }
}

/// Load the view for `path`. The boundary already holds any failure; the
/// resource keeps it too so the reason shows up in logs.
async fn prepare_view(shell: Storefront<Page>, path: String) -> Result<(), ViewError> {
    let result = shell.prepare(&path).await;
    if let Err(e) = &result {
        tracing::debug!("View for {} not prepared: {}", path, e);
    }
    result
}

/// Compose the storefront with the page modules and persisted store
fn build_storefront(auth: LocalAuthBackend, navigator: SignalNavigator) -> Storefront<Page> {
    let config = load_shell_config();

    let loader = LazyViewLoader::new()
        .register(views::HOME, module(|| async { Ok(Page::Home) }))
        .register(views::SHOP, module(|| async { Ok(Page::Shop) }))
        .register(views::CHECKOUT, module(|| async { Ok(Page::Checkout) }))
        .register(views::SIGN_IN, module(|| async { Ok(Page::SignInAndSignUp) }))
        .register(views::NOT_FOUND, module(|| async { Ok(Page::NotFound) }));

    Storefront::new(StorefrontParts {
        store: build_store(&config),
        backend: Arc::new(auth),
        navigator: Arc::new(navigator),
        routes: RouteTable::storefront(&config.signin_path, &config.home_path),
        loader,
        config,
    })
}

#[cfg(feature = "server")]
fn load_shell_config() -> ShellConfig {
    crate::config::load_config().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        ShellConfig::default()
    })
}

#[cfg(not(feature = "server"))]
fn load_shell_config() -> ShellConfig {
    ShellConfig::default()
}

fn build_store(config: &ShellConfig) -> Store {
    if !config.persist_session {
        return Store::default();
    }

    #[cfg(target_arch = "wasm32")]
    let persistence = crate::persist::LocalStoragePersistence::new(config.storage_key.clone());
    #[cfg(not(target_arch = "wasm32"))]
    let persistence = crate::persist::JsonFilePersistence::new(config.state_file_path());

    Store::with_persistence(Arc::new(persistence))
}

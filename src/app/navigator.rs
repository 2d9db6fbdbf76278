//! Navigation and auth services shared via context.
//!
//! The current path lives in a sync signal so the route table re-renders on
//! every navigation; in the browser the address bar is kept in step.

use dioxus::prelude::*;

use crate::auth::LocalAuthBackend;
use crate::navigation::Navigator;
use crate::routes::normalize_path;

/// `Navigator` backed by the app's path signal
#[derive(Clone, Copy)]
pub struct SignalNavigator {
    path: SyncSignal<String>,
}

impl SignalNavigator {
    pub fn new(path: SyncSignal<String>) -> Self {
        Self { path }
    }

    /// Current path; subscribes the calling component to navigation
    pub fn path(&self) -> String {
        self.path.read().clone()
    }

    fn set_path(&self, path: String) {
        let mut signal = self.path;
        // Skip no-op writes so a redirect during render settles
        if *signal.peek() != path {
            signal.set(path);
        }
    }
}

impl Navigator for SignalNavigator {
    fn current_path(&self) -> String {
        self.path.peek().clone()
    }

    fn redirect(&self, path: &str) {
        let path = normalize_path(path);
        #[cfg(target_arch = "wasm32")]
        browser::replace(&path);
        self.set_path(path);
    }

    fn push(&self, path: &str) {
        let path = normalize_path(path);
        #[cfg(target_arch = "wasm32")]
        browser::push(&path);
        self.set_path(path);
    }
}

/// Path the app starts on: the browser location, or `/` elsewhere
pub fn initial_path() -> String {
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(path) = browser::pathname() {
            return normalize_path(&path);
        }
    }
    "/".to_string()
}

/// Services provided at the app root
#[derive(Clone)]
pub struct AppServices {
    pub auth: LocalAuthBackend,
    pub navigator: SignalNavigator,
}

/// Get app services - use in any component below `App`
pub fn use_services() -> AppServices {
    use_context::<AppServices>()
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use wasm_bindgen::JsValue;

    pub fn pathname() -> Option<String> {
        web_sys::window()?.location().pathname().ok()
    }

    pub fn push(path: &str) {
        if let Some(history) = web_sys::window().and_then(|w| w.history().ok()) {
            let _ = history.push_state_with_url(&JsValue::NULL, "", Some(path));
        }
    }

    pub fn replace(path: &str) {
        if let Some(history) = web_sys::window().and_then(|w| w.history().ok()) {
            let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(path));
        }
    }
}

//! Navigation seam: where the current path comes from and how redirects
//! change it.

use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::routes::normalize_path;

pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    /// Replace the current location (no new history entry)
    fn redirect(&self, path: &str);

    /// Navigate to `path`, adding a history entry
    fn push(&self, path: &str);
}

/// History kept in memory, for tests and non-browser hosts
pub struct MemoryNavigator {
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(initial: &str) -> Self {
        Self {
            history: Mutex::new(vec![normalize_path(initial)]),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }

    fn redirect(&self, path: &str) {
        let path = normalize_path(path);
        debug!("Redirect to {}", path);
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        match history.last_mut() {
            Some(last) => *last = path,
            None => history.push(path),
        }
    }

    fn push(&self, path: &str) {
        let path = normalize_path(path);
        debug!("Navigate to {}", path);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_replaces_push_appends() {
        let nav = MemoryNavigator::new("/shop");
        nav.push("/signin");
        nav.redirect("/");
        assert_eq!(nav.current_path(), "/");
        assert_eq!(nav.history(), vec!["/shop".to_string(), "/".to_string()]);
    }
}

//! Failure isolation boundary.
//!
//! Wraps the production of a subtree. The first error (or panic) flips the
//! boundary into its failed state for good: the wrapped production is not
//! run again and callers get the failure record to render a fallback from.
//! Only a new boundary starts out normal again.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error};

use crate::loader::ViewLoadError;

/// Errors raised while producing a view
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error(transparent)]
    Load(#[from] ViewLoadError),
    #[error("render failed: {0}")]
    Render(String),
    #[error("panic while producing view: {0}")]
    Panic(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FailureRecord {
    /// Which part of the wrapped tree failed (usually the route path)
    pub subtree: String,
    pub error: ViewError,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BoundaryState {
    Normal,
    Failed(FailureRecord),
}

/// Output of a guarded production
#[derive(Clone, Debug, PartialEq)]
pub enum Guarded<T> {
    Rendered(T),
    Fallback(FailureRecord),
}

pub struct FailureBoundary {
    name: &'static str,
    failure: Mutex<Option<FailureRecord>>,
}

impl FailureBoundary {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            failure: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BoundaryState {
        match self.failure() {
            Some(record) => BoundaryState::Failed(record),
            None => BoundaryState::Normal,
        }
    }

    pub fn failure(&self) -> Option<FailureRecord> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }

    /// Run `produce` unless the boundary has already failed
    pub fn guard<T>(
        &self,
        subtree: &str,
        produce: impl FnOnce() -> Result<T, ViewError>,
    ) -> Guarded<T> {
        if let Some(record) = self.failure() {
            debug!("Boundary {} failed, skipping {}", self.name, subtree);
            return Guarded::Fallback(record);
        }

        match catch_unwind(AssertUnwindSafe(produce)) {
            Ok(Ok(value)) => Guarded::Rendered(value),
            Ok(Err(e)) => Guarded::Fallback(self.record(subtree, e)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                Guarded::Fallback(self.record(subtree, ViewError::Panic(message)))
            }
        }
    }

    /// Record a failure caught elsewhere in the subtree.
    ///
    /// The first failure is kept; later ones are logged and dropped.
    pub fn record(&self, subtree: &str, error: ViewError) -> FailureRecord {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = failure.as_ref() {
            debug!(
                "Boundary {} already failed, ignoring {} from {}",
                self.name, error, subtree
            );
            return existing.clone();
        }

        error!("Boundary {} caught failure in {}: {}", self.name, subtree, error);
        let record = FailureRecord {
            subtree: subtree.to_string(),
            error,
            at: Utc::now(),
        };
        *failure = Some(record.clone());
        record
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

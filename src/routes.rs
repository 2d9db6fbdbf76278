//! Route table and redirect gating.
//!
//! Entries are checked in table order and the first match wins. A guarded
//! entry runs its guard against the current session on every match, so the
//! decision follows session changes and not only navigation.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::session::Session;

/// Stable identifier of a lazily-loaded view module
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewRef(&'static str);

impl ViewRef {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ViewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// View modules of the storefront
pub mod views {
    use super::ViewRef;

    pub const HOME: ViewRef = ViewRef::new("home");
    pub const SHOP: ViewRef = ViewRef::new("shop");
    pub const CHECKOUT: ViewRef = ViewRef::new("checkout");
    pub const SIGN_IN: ViewRef = ViewRef::new("sign-in-and-sign-up");
    pub const NOT_FOUND: ViewRef = ViewRef::new("not-found");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// Whole path must equal the pattern (one trailing slash tolerated)
    Exact,
    /// Pattern must be a leading run of whole path segments
    Prefix,
    /// Matches anything
    CatchAll,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPattern {
    pub path: String,
    pub kind: MatchKind,
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match self.kind {
            MatchKind::CatchAll => true,
            MatchKind::Exact => path == self.path,
            MatchKind::Prefix => {
                self.path == "/"
                    || path == self.path
                    || path
                        .strip_prefix(self.path.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Strip query and fragment, ensure a leading slash, drop a trailing slash
pub fn normalize_path(path: &str) -> String {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Outcome of evaluating a guard: the gate of a guarded route
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateState {
    Rendering,
    Redirecting { to: String },
}

impl GateState {
    pub fn evaluate(guard: Option<&Guard>, session: Option<&Session>) -> Self {
        match guard {
            Some(guard) => (guard.decide)(session),
            None => GateState::Rendering,
        }
    }
}

type GuardFn = Arc<dyn Fn(Option<&Session>) -> GateState + Send + Sync>;

/// Session-dependent allow/redirect decision for a route
#[derive(Clone)]
pub struct Guard {
    name: &'static str,
    decide: GuardFn,
}

impl Guard {
    pub fn new(
        name: &'static str,
        decide: impl Fn(Option<&Session>) -> GateState + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            decide: Arc::new(decide),
        }
    }

    /// Sends signed-in users to `to` (used by the sign-in page)
    pub fn redirect_if_signed_in(to: impl Into<String>) -> Self {
        let to = to.into();
        Self::new("redirect_if_signed_in", move |session| match session {
            Some(_) => GateState::Redirecting { to: to.clone() },
            None => GateState::Rendering,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("name", &self.name).finish()
    }
}

#[derive(Clone, Debug)]
pub struct RouteEntry {
    pub pattern: PathPattern,
    pub view: ViewRef,
    pub guard: Option<Guard>,
}

impl RouteEntry {
    pub fn exact(path: &str, view: ViewRef) -> Self {
        Self::with_kind(path, MatchKind::Exact, view)
    }

    pub fn prefix(path: &str, view: ViewRef) -> Self {
        Self::with_kind(path, MatchKind::Prefix, view)
    }

    pub fn catch_all(view: ViewRef) -> Self {
        Self {
            pattern: PathPattern {
                path: "*".to_string(),
                kind: MatchKind::CatchAll,
            },
            view,
            guard: None,
        }
    }

    fn with_kind(path: &str, kind: MatchKind, view: ViewRef) -> Self {
        Self {
            pattern: PathPattern {
                path: normalize_path(path),
                kind,
            },
            view,
            guard: None,
        }
    }

    pub fn guarded(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }
}

/// Entry selected for a path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub view: ViewRef,
    /// Pattern of the matching entry
    pub pattern: String,
    /// Normalized path that was matched
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteMatch {
    Render(ViewDescriptor),
    Redirect { from: String, to: String },
    NotFound { path: String },
}

/// Ordered, immutable route table
#[derive(Clone, Debug)]
pub struct RouteTable {
    entries: Arc<[RouteEntry]>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Home, shop, checkout and a guarded sign-in page, then a not-found catch-all
    pub fn storefront(signin_path: &str, home_path: &str) -> Self {
        Self::new(vec![
            RouteEntry::exact(home_path, views::HOME),
            RouteEntry::prefix("/shop", views::SHOP),
            RouteEntry::exact("/checkout", views::CHECKOUT),
            RouteEntry::exact(signin_path, views::SIGN_IN)
                .guarded(Guard::redirect_if_signed_in(home_path)),
            RouteEntry::catch_all(views::NOT_FOUND),
        ])
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn match_route(&self, path: &str, session: Option<&Session>) -> RouteMatch {
        let normalized = normalize_path(path);
        let Some(entry) = self.entries.iter().find(|e| e.pattern.matches(&normalized)) else {
            debug!("No route for {}", normalized);
            return RouteMatch::NotFound { path: normalized };
        };

        match GateState::evaluate(entry.guard.as_ref(), session) {
            GateState::Rendering => {
                debug!("Route {} -> {}", normalized, entry.view);
                RouteMatch::Render(ViewDescriptor {
                    view: entry.view,
                    pattern: entry.pattern.path.clone(),
                    path: normalized,
                })
            }
            GateState::Redirecting { to } => {
                debug!("Route {} redirecting to {}", normalized, to);
                RouteMatch::Redirect {
                    from: normalized,
                    to,
                }
            }
        }
    }
}

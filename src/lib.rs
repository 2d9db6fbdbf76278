//! CRWN Storefront - root composition layer
//!
//! Wires a persisted client-side session, memoized derived state and a
//! gated, lazily-loaded view tree:
//! - Session observer keeping the store in sync with the auth backend
//! - Memoized selectors over the store
//! - Route table with session guards and redirects
//! - Lazy view loader with a loading fallback
//! - Failure boundary isolating page crashes from the header
//! - Dioxus web UI rendering the composed frames

pub mod app;
pub mod auth;
pub mod boundary;
pub mod config;
pub mod loader;
pub mod navigation;
pub mod observer;
pub mod persist;
pub mod routes;
pub mod selectors;
pub mod session;
pub mod shell;
pub mod store;

//! Shared UI components for the storefront shell.

pub mod error_fallback;
pub mod header;
pub mod nav_link;
pub mod spinner;

pub use error_fallback::ErrorFallback;
pub use header::Header;
pub use nav_link::NavLink;
pub use spinner::Spinner;

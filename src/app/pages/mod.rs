//! Page components and the lazily-resolved `Page` handle.
//!
//! The loader resolves each view ref to a `Page`; rendering a `Page` mounts
//! its component in its own scope.

use dioxus::prelude::*;

mod checkout;
mod home;
mod not_found;
mod shop;
mod sign_in;

pub use checkout::CheckoutPage;
pub use home::HomePage;
pub use not_found::NotFoundPage;
pub use shop::ShopPage;
pub use sign_in::SignInAndSignUpPage;

/// Resolved page module
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Home,
    Shop,
    Checkout,
    SignInAndSignUp,
    NotFound,
}

impl Page {
    pub fn render(self) -> Element {
        match self {
            Page::Home => rsx! { HomePage {} },
            Page::Shop => rsx! { ShopPage {} },
            Page::Checkout => rsx! { CheckoutPage {} },
            Page::SignInAndSignUp => rsx! { SignInAndSignUpPage {} },
            Page::NotFound => rsx! { NotFoundPage {} },
        }
    }
}

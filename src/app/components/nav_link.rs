//! In-app navigation link.

use dioxus::prelude::*;

use crate::app::navigator::use_services;
use crate::navigation::Navigator;

/// Link that navigates through the app navigator instead of reloading
#[component]
pub fn NavLink(
    /// Target path
    to: String,
    #[props(default)] class: String,
    children: Element,
) -> Element {
    let services = use_services();
    let href = to.clone();
    rsx! {
        a {
            class: "{class}",
            href: "{href}",
            onclick: move |evt: MouseEvent| {
                evt.prevent_default();
                services.navigator.push(&to);
            },
            {children}
        }
    }
}

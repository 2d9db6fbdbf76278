//! Static fallback rendered when the page area has crashed.

use dioxus::prelude::*;

#[component]
pub fn ErrorFallback() -> Element {
    rsx! {
        div { class: "card bg-error/10 border-error text-error p-6 text-center",
            h2 { class: "text-2xl", "Sorry, this page is broken" }
            p { "Reload the page to try again." }
        }
    }
}

use dioxus::prelude::*;

use crate::app::components::NavLink;

#[component]
pub fn NotFoundPage() -> Element {
    rsx! {
        section { class: "text-center",
            h1 { class: "text-2xl mb-4", "Page not found" }
            NavLink { to: "/", "Back to the store" }
        }
    }
}

//! Loading fallback shown while a page's code is being fetched.

use dioxus::prelude::*;

#[component]
pub fn Spinner() -> Element {
    rsx! {
        div { class: "flex justify-center items-center h-[60vh]",
            article { aria_busy: "true", "Loading..." }
        }
    }
}

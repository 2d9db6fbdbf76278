use dioxus::prelude::*;

use crate::app::components::NavLink;

const CATEGORIES: &[(&str, &str)] = &[
    ("hats", "Hats"),
    ("jackets", "Jackets"),
    ("sneakers", "Sneakers"),
    ("womens", "Womens"),
    ("mens", "Mens"),
];

/// Home page: category directory.
#[component]
pub fn HomePage() -> Element {
    rsx! {
        section { class: "grid grid-cols-1 md:grid-cols-3 gap-4",
            for (slug, title) in CATEGORIES.iter().copied() {
                NavLink {
                    to: format!("/shop/{}", slug),
                    class: "card p-8 text-center",
                    h2 { class: "text-xl font-bold", "{title}" }
                    span { "SHOP NOW" }
                }
            }
        }
    }
}

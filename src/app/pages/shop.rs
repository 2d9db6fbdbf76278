use dioxus::prelude::*;

use crate::app::navigator::use_services;

/// Shop page; nested paths select a category.
#[component]
pub fn ShopPage() -> Element {
    let services = use_services();
    let path = services.navigator.path();
    let category = path
        .strip_prefix("/shop")
        .map(|rest| rest.trim_matches('/'))
        .filter(|rest| !rest.is_empty())
        .map(str::to_string);

    rsx! {
        section {
            h1 { class: "text-2xl mb-4", "Shop" }
            if let Some(category) = category {
                p { "Category: {category}" }
            } else {
                p { "All collections" }
            }
        }
    }
}

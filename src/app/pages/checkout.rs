use dioxus::prelude::*;

/// Checkout page.
#[component]
pub fn CheckoutPage() -> Element {
    rsx! {
        section {
            h1 { class: "text-2xl mb-4", "Checkout" }
            p { "Your cart is empty." }
        }
    }
}

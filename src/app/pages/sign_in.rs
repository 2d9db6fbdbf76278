//! Sign-in and sign-up page.
//!
//! Only reachable while signed out; the route guard redirects signed-in
//! users home.

use dioxus::prelude::*;

use crate::app::navigator::use_services;
use crate::session::Session;

#[component]
pub fn SignInAndSignUpPage() -> Element {
    let services = use_services();
    let mut email = use_signal(String::new);
    let mut display_name = use_signal(String::new);

    let sign_in_auth = services.auth.clone();
    let sign_in = move |evt: FormEvent| {
        evt.prevent_default();
        let email = email.read().trim().to_string();
        if email.is_empty() {
            return;
        }
        sign_in_auth.sign_in(Session::new(email.clone()).with_email(email));
    };

    let sign_up_auth = services.auth.clone();
    let sign_up = move |evt: FormEvent| {
        evt.prevent_default();
        let name = display_name.read().trim().to_string();
        let email = email.read().trim().to_string();
        if name.is_empty() || email.is_empty() {
            return;
        }
        sign_up_auth.sign_in(
            Session::new(email.clone())
                .with_email(email)
                .with_display_name(name),
        );
    };

    rsx! {
        div { class: "grid grid-cols-1 md:grid-cols-2 gap-8",
            form { onsubmit: sign_in,
                h2 { class: "text-xl mb-2", "I already have an account" }
                input {
                    r#type: "email",
                    placeholder: "Email",
                    value: "{email}",
                    oninput: move |evt| email.set(evt.value()),
                }
                button { r#type: "submit", class: "btn", "SIGN IN" }
            }
            form { onsubmit: sign_up,
                h2 { class: "text-xl mb-2", "I do not have an account" }
                input {
                    r#type: "text",
                    placeholder: "Display name",
                    value: "{display_name}",
                    oninput: move |evt| display_name.set(evt.value()),
                }
                button { r#type: "submit", class: "btn", "SIGN UP" }
            }
        }
    }
}

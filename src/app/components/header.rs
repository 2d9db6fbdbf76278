//! Header shown above every page, outside the failure boundary.

use dioxus::prelude::*;

use super::nav_link::NavLink;
use crate::app::navigator::use_services;
use crate::session::{Session, SyncFailure};

#[derive(Props, Clone, PartialEq)]
pub struct HeaderProps {
    /// Signed-in user, if any
    pub current_user: Option<Session>,
    /// Last session sync failure
    #[props(default)]
    pub sync_error: Option<SyncFailure>,
}

#[component]
pub fn Header(props: HeaderProps) -> Element {
    let services = use_services();
    let version = env!("CRWN_VERSION");

    rsx! {
        nav { class: "flex justify-between items-center h-16 mb-6",
            NavLink { to: "/", class: "font-bold", "CRWN" }
            ul { class: "flex gap-6 items-center",
                li {
                    NavLink { to: "/shop", "SHOP" }
                }
                li {
                    NavLink { to: "/checkout", "CHECKOUT" }
                }
                li {
                    if let Some(user) = props.current_user.as_ref() {
                        span { class: "text-muted mr-3", "{user.label()}" }
                        button {
                            class: "btn btn-ghost btn-sm",
                            onclick: move |_| services.auth.sign_out(),
                            "SIGN OUT"
                        }
                    } else {
                        NavLink { to: "/signin", "SIGN IN" }
                    }
                }
            }
            small { class: "text-muted", "v{version}" }
        }
        if let Some(failure) = props.sync_error.as_ref() {
            div { class: "alert alert-warning mb-4",
                "Session sync unavailable: {failure.message}"
            }
        }
    }
}

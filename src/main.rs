//! CRWN storefront
//!
//! Serves the storefront app; session sync, routing and lazy page loading
//! live in the library.

fn main() {
    #[cfg(feature = "server")]
    init_logging();

    tracing::info!(
        "Starting CRWN storefront v{} ({})",
        env!("CRWN_VERSION"),
        env!("CRWN_GIT_SHA")
    );

    dioxus::launch(crwn_storefront::app::App);
}

#[cfg(feature = "server")]
fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crwn_storefront=debug,dioxus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

//! Stamps the storefront build with a version and commit for the header.
//!
//! `CRWN_VERSION` falls back to the crate version. `CRWN_GIT_SHA` falls back
//! to a CI-provided `GITHUB_SHA`, then to the local checkout, then "unknown".

use std::env;
use std::process::Command;

const SHORT_SHA: usize = 7;

fn main() {
    for var in ["CRWN_VERSION", "CRWN_GIT_SHA", "GITHUB_SHA"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");

    let version = env::var("CRWN_VERSION")
        .or_else(|_| env::var("CARGO_PKG_VERSION"))
        .unwrap_or_else(|_| "unknown".to_string());

    let sha = env::var("CRWN_GIT_SHA")
        .ok()
        .or_else(|| env::var("GITHUB_SHA").ok().map(|sha| short(&sha)))
        .or_else(checkout_sha)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=CRWN_VERSION={}", version);
    println!("cargo:rustc-env=CRWN_GIT_SHA={}", sha);
}

fn short(sha: &str) -> String {
    sha.chars().take(SHORT_SHA).collect()
}

/// Commit of the local checkout, if built from one
fn checkout_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let sha = String::from_utf8(output.stdout).ok()?;
    let sha = sha.trim();
    (!sha.is_empty()).then(|| short(sha))
}

//! Session ownership lint - only the session observer may write the user.
//!
//! The auth backend is the source of truth for who is signed in. The
//! observer mirrors it into the store; nothing else may dispatch
//! `SetCurrentUser` or `ClearCurrentUser`, otherwise the store and the
//! backend can disagree until the next auth notification arrives.
//!
//! Test modules are skipped: they drive the store directly on purpose.

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Dispatches that write the current user
const SESSION_WRITES: &[&str] = &[
    "dispatch(Action::SetCurrentUser",
    "dispatch(Action::ClearCurrentUser",
    "dispatch(crate::store::Action::SetCurrentUser",
    "dispatch(crate::store::Action::ClearCurrentUser",
];

/// Files allowed to write the session
const ALLOWED_FILES: &[&str] = &["observer.rs"];

/// Code before the first `#[cfg(test)]`
fn non_test_code(content: &str) -> &str {
    match content.find("#[cfg(test)]") {
        Some(pos) => &content[..pos],
        None => content,
    }
}

fn analyze_file(path: &Path) -> Vec<String> {
    let path_str = path.display().to_string();
    if ALLOWED_FILES
        .iter()
        .any(|allowed| path.file_name().is_some_and(|name| name == *allowed))
    {
        return vec![];
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return vec![],
    };
    let code = non_test_code(&content);
    // rustfmt may break a long dispatch over several lines
    let squashed: String = code.chars().filter(|c| !c.is_whitespace()).collect();

    SESSION_WRITES
        .iter()
        .filter(|pattern| squashed.contains(*pattern))
        .map(|pattern| format!("{}: {}", path_str, pattern))
        .collect()
}

#[test]
fn only_observer_writes_session() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");

    let violations: Vec<String> = WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .flat_map(|e| analyze_file(e.path()))
        .collect();

    assert!(
        violations.is_empty(),
        "\n\nSession writes outside the session observer:\n  {}\n\n\
         Sign in/out through the auth backend instead; the observer will\n\
         mirror the change into the store.\n",
        violations.join("\n  ")
    );
}

#[test]
fn observer_is_still_the_writer() {
    let src = fs::read_to_string(Path::new(env!("CARGO_MANIFEST_DIR")).join("src/observer.rs"))
        .expect("Failed to read src/observer.rs");
    let code: String = non_test_code(&src)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    assert!(
        code.contains("dispatch(Action::SetCurrentUser") && code.contains("dispatch(Action::ClearCurrentUser"),
        "Session observer no longer dispatches session changes; update this lint if the writer moved"
    );
}

//! Configuration management

use serde::Deserialize;
use std::path::PathBuf;

/// Settings for the storefront shell
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Path of the guarded sign-in page
    pub signin_path: String,
    /// Where signed-in users are sent from the sign-in page
    pub home_path: String,
    /// Longest redirect chain followed in one render
    pub redirect_limit: usize,
    /// Persist the session snapshot between runs
    pub persist_session: bool,
    /// Snapshot file for native builds (defaults into the data dir)
    pub state_file: Option<PathBuf>,
    /// localStorage key for browser builds
    pub storage_key: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            signin_path: "/signin".to_string(),
            home_path: "/".to_string(),
            redirect_limit: 4,
            persist_session: true,
            state_file: None,
            storage_key: "persist:root".to_string(),
        }
    }
}

impl ShellConfig {
    /// Snapshot file, falling back to `session.json` in the data dir
    pub fn state_file_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| get_data_dir().join("session.json"))
    }
}

/// Get config directory (XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CRWN_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/crwn-storefront");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("crwn-storefront");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/crwn-storefront");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("crwn-storefront");
        }
    }

    PathBuf::from(".")
}

/// Get data directory (XDG_DATA_HOME or platform default)
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CRWN_DATA_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/crwn-storefront");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("crwn-storefront");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/share/crwn-storefront");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("LOCALAPPDATA") {
            return PathBuf::from(appdata).join("crwn-storefront");
        }
    }

    PathBuf::from("./data")
}

/// Load shell settings: defaults, then `<config dir>/config.*`, then
/// `CRWN_*` environment variables.
#[cfg(feature = "server")]
pub fn load_config() -> anyhow::Result<ShellConfig> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // CRWN_SIGNIN_PATH, CRWN_REDIRECT_LIMIT, ...
        .add_source(
            ::config::Environment::with_prefix("CRWN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let shell: ShellConfig = config.try_deserialize()?;
    tracing::debug!("Loaded shell config: {:?}", shell);
    Ok(shell)
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        env::set_var("CRWN_CONFIG_DIR", "/tmp/crwn-test-nonexistent");

        let config = load_config().expect("config should load");

        env::remove_var("CRWN_CONFIG_DIR");

        assert_eq!(config, ShellConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var("CRWN_CONFIG_DIR", "/tmp/crwn-test-nonexistent");
        env::set_var("CRWN_SIGNIN_PATH", "/login");
        env::set_var("CRWN_REDIRECT_LIMIT", "2");

        let config = load_config().expect("config should load");

        env::remove_var("CRWN_CONFIG_DIR");
        env::remove_var("CRWN_SIGNIN_PATH");
        env::remove_var("CRWN_REDIRECT_LIMIT");

        assert_eq!(config.signin_path, "/login");
        assert_eq!(config.redirect_limit, 2);
        assert_eq!(config.home_path, "/");
    }

    #[test]
    #[serial]
    fn test_config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "home_path = \"/shop\"\npersist_session = false\n",
        )
        .unwrap();
        env::set_var("CRWN_CONFIG_DIR", dir.path());

        let config = load_config().expect("config should load");

        env::remove_var("CRWN_CONFIG_DIR");

        assert_eq!(config.home_path, "/shop");
        assert!(!config.persist_session);
    }

    #[test]
    #[serial]
    fn test_state_file_defaults_into_data_dir() {
        env::set_var("CRWN_DATA_DIR", "/tmp/crwn-data");
        let path = ShellConfig::default().state_file_path();
        env::remove_var("CRWN_DATA_DIR");

        assert_eq!(path, PathBuf::from("/tmp/crwn-data/session.json"));
    }
}

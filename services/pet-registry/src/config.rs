//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! The API password comes from API_PASSWORD or password_file and is never
//! read from the TOML directly, so config files can be shared safely.

use common::Secret;
use registry_auth::Credentials;
use registry_client::ClientSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
}

/// Backend location and timing
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub health_path: String,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub max_auth_rounds: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let defaults = ClientSettings::new("");
        Self {
            base_url: String::new(),
            login_path: defaults.login_path,
            refresh_path: defaults.refresh_path,
            health_path: defaults.health_path,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            refresh_timeout_secs: defaults.refresh_timeout.as_secs(),
            health_timeout_secs: defaults.health_timeout.as_secs(),
            max_auth_rounds: defaults.max_auth_rounds,
        }
    }
}

/// Fallback credentials and session storage
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Path to a file containing the password (alternative to API_PASSWORD)
    pub password_file: Option<PathBuf>,
    /// Where the session token is persisted between invocations
    pub token_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            password_file: None,
            token_file: PathBuf::from("pet-registry-token.json"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Configuration from defaults and environment variables alone.
    pub fn from_env() -> common::Result<Self> {
        Self::parse("")
    }

    fn parse(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay API_BASE_URL, API_USERNAME and API_PASSWORD.
    ///
    /// Password resolution order:
    /// 1. API_PASSWORD env var
    /// 2. password_file path from config
    fn apply_env(&mut self) -> common::Result<()> {
        if let Ok(url) = std::env::var("API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Ok(username) = std::env::var("API_USERNAME") {
            self.auth.username = Some(username);
        }

        if let Ok(password) = std::env::var("API_PASSWORD") {
            self.auth.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = self.auth.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim().to_owned();
            if !password.is_empty() {
                self.auth.password = Some(Secret::new(password));
            }
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(common::Error::invalid(
                "api.base_url",
                "is required (set it in the config file or API_BASE_URL)",
            ));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(common::Error::invalid(
                "api.base_url",
                format!("must start with http:// or https://, got: {base_url}"),
            ));
        }

        for (field, secs) in [
            ("api.request_timeout_secs", self.api.request_timeout_secs),
            ("api.refresh_timeout_secs", self.api.refresh_timeout_secs),
            ("api.health_timeout_secs", self.api.health_timeout_secs),
        ] {
            if secs == 0 {
                return Err(common::Error::invalid(field, "must be greater than 0"));
            }
        }

        if self.api.max_auth_rounds == 0 {
            return Err(common::Error::invalid(
                "api.max_auth_rounds",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Client settings derived from the `[api]` section.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api.base_url.trim().to_string(),
            login_path: self.api.login_path.clone(),
            refresh_path: self.api.refresh_path.clone(),
            health_path: self.api.health_path.clone(),
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
            refresh_timeout: Duration::from_secs(self.api.refresh_timeout_secs),
            health_timeout: Duration::from_secs(self.api.health_timeout_secs),
            max_auth_rounds: self.api.max_auth_rounds,
        }
    }

    /// Fallback login credentials, when both halves are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.auth.username.as_deref().map(str::trim)?;
        let password = self.auth.password.as_ref()?;
        if username.is_empty() || password.is_blank() {
            return None;
        }
        Some(Credentials {
            username: username.to_string(),
            password: password.clone(),
        })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// Returns the path and whether it was asked for explicitly.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from("pet-registry.toml"), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_api_env() {
        for key in ["API_BASE_URL", "API_USERNAME", "API_PASSWORD", "CONFIG_PATH"] {
            unsafe { remove_env(key) };
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("pet-registry.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_applies_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://pets.example.gov/api"

[auth]
username = "admin"
"#,
        );

        let config = Config::load(&path).unwrap();
        let settings = config.client_settings();
        assert_eq!(settings.base_url, "https://pets.example.gov/api");
        assert_eq!(settings.login_path, "/login");
        assert_eq!(settings.refresh_path, "/refresh");
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.refresh_timeout, Duration::from_secs(5));
        assert_eq!(settings.health_timeout, Duration::from_secs(3));
        assert_eq!(settings.max_auth_rounds, 3);
        assert_eq!(config.auth.token_file, PathBuf::from("pet-registry-token.json"));
        // Username without a password is not usable for fallback login
        assert!(config.credentials().is_none());
    }

    #[test]
    fn env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://file.example"

[auth]
username = "from-file"
"#,
        );

        unsafe { set_env("API_BASE_URL", "http://localhost:8080") };
        unsafe { set_env("API_USERNAME", "admin") };
        unsafe { set_env("API_PASSWORD", "s3cret") };
        let config = Config::load(&path).unwrap();
        clear_api_env();

        assert_eq!(config.api.base_url, "http://localhost:8080");
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password.expose(), "s3cret");
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn password_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();
        let dir = tempfile::tempdir().unwrap();
        let password_path = dir.path().join("password");
        std::fs::write(&password_path, "from-file\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[api]
base_url = "https://pets.example.gov"

[auth]
username = "admin"
password_file = "{}"
"#,
                password_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.credentials().unwrap().password.expose(), "from-file");
    }

    #[test]
    fn password_env_overrides_missing_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://pets.example.gov"

[auth]
username = "admin"
password_file = "/nonexistent/password"
"#,
        );

        unsafe { set_env("API_PASSWORD", "env-wins") };
        let config = Config::load(&path).unwrap();
        clear_api_env();
        assert_eq!(config.credentials().unwrap().password.expose(), "env-wins");

        let result = Config::load(&path);
        assert!(result.is_err(), "unreadable password_file must be an error");
    }

    #[test]
    fn blank_password_file_yields_no_credentials() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();
        let dir = tempfile::tempdir().unwrap();
        let password_path = dir.path().join("password");
        std::fs::write(&password_path, "  \n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[api]
base_url = "https://pets.example.gov"

[auth]
username = "admin"
password_file = "{}"
"#,
                password_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        assert!(config.auth.password.is_none());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn base_url_required_and_validated() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();

        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains("api.base_url: is required"), "got: {err}");

        unsafe { set_env("API_BASE_URL", "pets.example.gov") };
        let err = Config::from_env().unwrap_err().to_string();
        clear_api_env();
        assert!(err.contains("must start with http"), "got: {err}");
    }

    #[test]
    fn from_env_alone_is_enough() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();
        unsafe { set_env("API_BASE_URL", "http://127.0.0.1:3000") };
        unsafe { set_env("API_USERNAME", "admin") };
        unsafe { set_env("API_PASSWORD", "admin") };
        let config = Config::from_env();
        clear_api_env();

        let config = config.unwrap();
        assert_eq!(config.client_settings().base_url, "http://127.0.0.1:3000");
        assert!(config.credentials().is_some());
    }

    #[test]
    fn zero_timeouts_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();
        let dir = tempfile::tempdir().unwrap();

        for field in ["request_timeout_secs", "refresh_timeout_secs", "health_timeout_secs"] {
            let path = write_config(
                &dir,
                &format!("[api]\nbase_url = \"https://pets.example.gov\"\n{field} = 0\n"),
            );
            let err = Config::load(&path).unwrap_err().to_string();
            assert!(err.contains(field), "got: {err}");
        }

        let path = write_config(
            &dir,
            "[api]\nbase_url = \"https://pets.example.gov\"\nmax_auth_rounds = 0\n",
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn invalid_toml_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = Config::load(Path::new("/nonexistent/path/pet-registry.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_api_env();

        assert_eq!(
            Config::resolve_path(None),
            (PathBuf::from("pet-registry.toml"), false)
        );

        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        assert_eq!(
            Config::resolve_path(None),
            (PathBuf::from("/env/path.toml"), true)
        );
        assert_eq!(
            Config::resolve_path(Some(Path::new("/cli/wins.toml"))),
            (PathBuf::from("/cli/wins.toml"), true),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        clear_api_env();
    }
}

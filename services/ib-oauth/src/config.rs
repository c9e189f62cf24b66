//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `IB_OAUTH_CLIENT_ID` and `IB_OAUTH_BASE_URL` override the `[oauth]` values
//! so one file can be pointed at different servers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ib_auth::{
    FileStorage, MemoryStorage, OAuthConfig, SESSION_EXPIRED_PHRASE, SqliteStorage,
    TokenRequestFormat, TokenStorage, WELL_KNOWN_CLIENT_ID,
};
use ib_client::ClientOptions;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub oauth: OAuthSection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Authorization server and client registration
#[derive(Debug, Deserialize)]
pub struct OAuthSection {
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub redirect_uri: String,
    pub base_url: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_request_format: TokenRequestFormat,
}

/// Dispatcher behaviour
#[derive(Debug, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_use_pkce")]
    pub use_pkce: bool,
    #[serde(default = "default_session_expired_phrase")]
    pub session_expired_phrase: String,
    /// Refresh this many seconds before expiry. Unset disables proactive refresh.
    #[serde(default)]
    pub refresh_skew_secs: Option<u64>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            use_pkce: default_use_pkce(),
            session_expired_phrase: default_session_expired_phrase(),
            refresh_skew_secs: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Where tokens and the pending verifier are kept
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    File {
        #[serde(default = "default_token_file")]
        path: PathBuf,
    },
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_namespace")]
        namespace: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            path: default_token_file(),
        }
    }
}

fn default_client_id() -> String {
    WELL_KNOWN_CLIENT_ID.to_string()
}

fn default_use_pkce() -> bool {
    true
}

fn default_session_expired_phrase() -> String {
    SESSION_EXPIRED_PHRASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_token_file() -> PathBuf {
    PathBuf::from(".ib_tokens.json")
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// The `[oauth]` section is validated by building an `OAuthConfig`, so a
    /// config that loads is guaranteed to produce one.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(client_id) = std::env::var("IB_OAUTH_CLIENT_ID") {
            config.oauth.client_id = client_id;
        }
        if let Ok(base_url) = std::env::var("IB_OAUTH_BASE_URL") {
            config.oauth.base_url = base_url;
        }

        if config.client.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        config.oauth_config()?;
        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("ib-oauth.toml")
    }

    pub fn oauth_config(&self) -> common::Result<OAuthConfig> {
        let oauth = &self.oauth;
        let mut config = OAuthConfig::new(&oauth.client_id, &oauth.redirect_uri, &oauth.base_url)
            .map_err(|e| common::Error::Config(e.to_string()))?
            .with_token_request_format(oauth.token_request_format);
        if let Some(scope) = &oauth.scope {
            config = config
                .with_scope(scope)
                .map_err(|e| common::Error::Config(e.to_string()))?;
        }
        Ok(config)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            use_pkce: self.client.use_pkce,
            session_expired_phrase: self.client.session_expired_phrase.clone(),
            refresh_skew: self.client.refresh_skew_secs.map(Duration::from_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_secs)
    }

    /// Open the configured storage backend.
    pub fn open_storage(&self) -> common::Result<Arc<dyn TokenStorage>> {
        let storage: Arc<dyn TokenStorage> = match &self.storage {
            StorageConfig::Memory => Arc::new(MemoryStorage::new()),
            StorageConfig::File { path } => Arc::new(FileStorage::new(path)),
            StorageConfig::Sqlite { path, namespace } => Arc::new(
                SqliteStorage::open(path, namespace.as_str())
                    .map_err(|e| common::Error::Config(e.to_string()))?,
            ),
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    /// SAFETY: Callers must hold ENV_MUTEX.
    unsafe fn clear_overlay_env() {
        unsafe {
            remove_env("IB_OAUTH_CLIENT_ID");
            remove_env("IB_OAUTH_BASE_URL");
        }
    }

    fn minimal_toml() -> &'static str {
        r#"
[oauth]
redirect_uri = "http://localhost:8765/callback"
base_url = "https://auth.example.com"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("ib-oauth.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_overlay_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.oauth.client_id, "mcp-public-client");
        assert_eq!(config.oauth.token_request_format, TokenRequestFormat::Json);
        assert!(config.client.use_pkce);
        assert_eq!(config.client.session_expired_phrase, "Session has expired");
        assert_eq!(config.client.timeout_secs, 30);
        assert_eq!(
            config.storage,
            StorageConfig::File {
                path: PathBuf::from(".ib_tokens.json")
            }
        );

        let oauth = config.oauth_config().unwrap();
        assert_eq!(oauth.scope(), "profile");
        assert_eq!(oauth.token_endpoint(), "https://auth.example.com/token");
        assert_eq!(config.client_options(), ClientOptions::default());
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_overlay_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[oauth]
client_id = "my-app"
redirect_uri = "https://app.example.com/cb"
base_url = "https://auth.example.com/"
scope = "profile email"
token_request_format = "form"

[client]
use_pkce = false
session_expired_phrase = "Login required"
refresh_skew_secs = 60
timeout_secs = 5

[storage]
backend = "sqlite"
path = "/var/lib/ib-oauth/state.db"
namespace = "my-app"
"#,
        );

        let config = Config::load(&path).unwrap();
        let oauth = config.oauth_config().unwrap();
        assert_eq!(oauth.client_id(), "my-app");
        assert_eq!(oauth.base_url(), "https://auth.example.com");
        assert_eq!(oauth.scope(), "profile email");
        assert_eq!(oauth.token_request_format(), TokenRequestFormat::Form);

        let options = config.client_options();
        assert!(!options.use_pkce);
        assert_eq!(options.session_expired_phrase, "Login required");
        assert_eq!(options.refresh_skew, Some(Duration::from_secs(60)));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: PathBuf::from("/var/lib/ib-oauth/state.db"),
                namespace: "my-app".into()
            }
        );
    }

    #[test]
    fn test_memory_storage_backend() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_overlay_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!("{}\n[storage]\nbackend = \"memory\"\n", minimal_toml()),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert!(config.open_storage().is_ok());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        unsafe {
            set_env("IB_OAUTH_CLIENT_ID", "env-client");
            set_env("IB_OAUTH_BASE_URL", "https://staging.example.com");
        }
        let result = Config::load(&path);
        unsafe { clear_overlay_env() };

        let config = result.unwrap();
        assert_eq!(config.oauth.client_id, "env-client");
        assert_eq!(
            config.oauth_config().unwrap().authorize_endpoint(),
            "https://staging.example.com/authorize"
        );
    }

    #[test]
    fn test_invalid_env_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        unsafe { set_env("IB_OAUTH_BASE_URL", "not a url") };
        let result = Config::load(&path);
        unsafe { clear_overlay_env() };

        assert!(matches!(result, Err(common::Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/ib-oauth.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_missing_oauth_section_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[client]\nuse_pkce = true\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_empty_client_id_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_overlay_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!("{}client_id = \"\"\n", minimal_toml()),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("client_id"), "{err}");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_overlay_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!("{}\n[client]\ntimeout_secs = 0\n", minimal_toml()),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "{err}");
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, PathBuf::from("/env/path.toml"));
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("ib-oauth.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
    }
}

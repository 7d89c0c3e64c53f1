//! Configuration types and loading
//!
//! Precedence: `--config` > `CONFIG_PATH` > `storefront.toml`. Every field has
//! a default, so a missing default file is not an error. The store credential
//! may come from `STORE_CREDENTIAL` instead of the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storefront_auth::{SELLER_LOGIN_PATH, Secret};

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "storefront.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Commerce API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub store_credential: Option<Secret>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            store_credential: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("storefront-credentials.json")
}

fn default_login_path() -> String {
    SELLER_LOGIN_PATH.to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Like `load`, but a missing `storefront.toml` in the working directory
    /// yields the defaults. An explicitly named file must exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path == Path::new(DEFAULT_CONFIG_FILE) && !path.exists() {
            return Self::parse("");
        }
        Self::load(path)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if let Ok(credential) = std::env::var("STORE_CREDENTIAL") {
            let credential = credential.trim();
            if !credential.is_empty() {
                config.api.store_credential = Some(Secret::new(credential));
            }
        }

        if !config.api.base_url.starts_with("http://")
            && !config.api.base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.api.base_url
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".into()));
        }

        if !config.admin.login_path.starts_with('/') {
            return Err(Error::Config(format!(
                "login_path must be an absolute path, got: {}",
                config.admin.login_path
            )));
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}

use crate::application_impl::SessionConfig;
use crate::domain_model::*;
use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    #[serde(default)]
    pub session: Session,
    pub storage: Storage,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    #[serde(default = "default_reissue_path")]
    pub reissue_path: String,
    #[serde(default = "default_refresh_header")]
    pub refresh_header: String,
    #[serde(default = "default_true")]
    pub refresh_header_bearer: bool,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    #[serde(default = "default_true")]
    pub expired_status_relaxed: bool,
    #[serde(default = "default_reissue_timeout_secs")]
    pub reissue_timeout_secs: u64,
    #[serde(default = "default_reissue_backend")]
    pub reissue_backend: String, // "http" or "fake"
}

impl Default for Session {
    fn default() -> Self {
        Self {
            expired_status_relaxed: true,
            reissue_timeout_secs: default_reissue_timeout_secs(),
            reissue_backend: default_reissue_backend(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory", "file" or "redis"
    pub path: Option<String>,
    pub redis_url: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_access_token_key")]
    pub access_token_key: String,
    #[serde(default = "default_refresh_token_key")]
    pub refresh_token_key: String,
    pub legacy_keys: Option<Vec<LegacyKey>>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_true() -> bool {
    true
}

fn default_reissue_path() -> String {
    "/auth/reissue".to_string()
}

fn default_refresh_header() -> String {
    crate::infra_http::DEFAULT_REFRESH_HEADER.to_string()
}

fn default_reissue_timeout_secs() -> u64 {
    10
}

fn default_reissue_backend() -> String {
    "http".to_string()
}

fn default_prefix() -> String {
    "wayfarer".to_string()
}

fn default_access_token_key() -> String {
    DEFAULT_ACCESS_TOKEN_KEY.to_string()
}

fn default_refresh_token_key() -> String {
    DEFAULT_REFRESH_TOKEN_KEY.to_string()
}

impl Settings {
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.api.base_url).map_err(|e| anyhow!("invalid api.base_url: {}", e))
    }

    pub fn reissue_url(&self) -> Result<Url> {
        let path = &self.api.reissue_path;
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        let joined = format!(
            "{}/{}",
            self.api.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| anyhow!("invalid api.reissue_path: {}", e))
    }

    pub fn storage_keys(&self) -> StorageKeys {
        let defaults = StorageKeys::default();
        StorageKeys {
            access_token: self.storage.access_token_key.clone(),
            refresh_token: self.storage.refresh_token_key.clone(),
            legacy: self.storage.legacy_keys.clone().unwrap_or(defaults.legacy),
        }
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig {
            reissue_url: self.reissue_url()?,
            keys: self.storage_keys(),
            expiry: ExpiryPolicy {
                relaxed: self.session.expired_status_relaxed,
            },
            reissue_timeout: Duration::from_secs(self.session.reissue_timeout_secs),
        })
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

//! Client configuration.
//!
//! Every setting is an explicit field. [`ClientConfig::from_env`] fills the
//! ones left unset from the environment; nothing is read implicitly later.

use crate::models::ApiKey;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.census.gov/data";
pub const ENV_API_KEY: &str = "CENSUS_API_KEY";
pub const ENV_CACHE_DIR: &str = "CENSUS_CACHE_DIR";
pub const ENV_BASE_URL: &str = "CENSUS_API_BASE_URL";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<ApiKey>,
    /// Where catalogs are persisted when `cache_catalog` is set.
    pub cache_dir: Option<PathBuf>,
    pub cache_catalog: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Log each rendered request at `info` level before sending it.
    pub show_call: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            cache_dir: None,
            cache_catalog: false,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            show_call: false,
        }
    }
}

impl ClientConfig {
    /// Defaults, with key, cache directory and base URL taken from the
    /// environment.
    pub fn from_env() -> Self {
        Self::default().resolve_env()
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = ApiKey::new(key);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn cache_catalog(mut self, enabled: bool) -> Self {
        self.cache_catalog = enabled;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn show_call(mut self, enabled: bool) -> Self {
        self.show_call = enabled;
        self
    }

    /// Fill fields that are still unset: explicit value, then environment,
    /// then default.
    pub fn resolve_env(self) -> Self {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    fn resolve_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.api_key.is_none() {
            self.api_key = lookup(ENV_API_KEY).and_then(ApiKey::new);
        }
        if self.cache_dir.is_none() {
            self.cache_dir = lookup(ENV_CACHE_DIR)
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from);
        }
        if self.base_url == DEFAULT_BASE_URL
            && let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty())
        {
            self.base_url = url;
        }
        self
    }

    /// Cache directory to use: the configured one or the platform cache dir.
    pub fn effective_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("census-rs")))
    }
}

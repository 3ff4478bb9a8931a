//! Store configuration.
//!
//! Loaded from a `sqlrest.toml` file:
//!
//! ```toml
//! [store]
//! url = "https://project.example.co"
//! api_key = "service-role-key"
//! schema = "public"      # optional
//! timeout_secs = 30      # optional
//! page_size = 1000       # optional
//! ```
//!
//! or from `SQLREST_URL`, `SQLREST_API_KEY` and `SQLREST_SCHEMA`.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{SqlRestError, SqlRestResult};
use crate::translator::DEFAULT_PAGE_SIZE;

pub const CONFIG_FILE: &str = "sqlrest.toml";

/// Connection settings for the upstream query service.
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the service, without the `/rest/v1` suffix.
    pub url: String,

    /// Key sent as both `apikey` and bearer token.
    pub api_key: String,

    /// Schema profile; the service default when unset.
    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Page size for OFFSET without LIMIT.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Deserialize)]
struct ConfigFile {
    store: StoreConfig,
}

// Keep the key out of logs.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("schema", &self.schema)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            schema: None,
            timeout_secs: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Parse the `[store]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> SqlRestResult<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| SqlRestError::Config(e.to_string()))?;
        file.store.validate()
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> SqlRestResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Read `SQLREST_URL`, `SQLREST_API_KEY` and `SQLREST_SCHEMA`.
    pub fn from_env() -> SqlRestResult<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| SqlRestError::Config(format!("{} is not set", name)))
        };
        Self {
            url: var("SQLREST_URL")?,
            api_key: var("SQLREST_API_KEY")?,
            schema: std::env::var("SQLREST_SCHEMA").ok(),
            ..Self::default()
        }
        .validate()
    }

    /// `./sqlrest.toml`, then the user config dir, then the environment.
    pub fn discover() -> SqlRestResult<Self> {
        for path in candidate_paths() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(&path);
            }
        }
        Self::from_env()
    }

    pub fn validate(self) -> SqlRestResult<Self> {
        if self.url.trim().is_empty() {
            return Err(SqlRestError::Config("url must not be empty".to_string()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(SqlRestError::Config(format!(
                "url must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(SqlRestError::Config("api_key must not be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(SqlRestError::Config("page_size must be positive".to_string()));
        }
        Ok(self)
    }

    /// Endpoint for a table, e.g. `https://host/rest/v1/calls`.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), table)
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("sqlrest").join(CONFIG_FILE));
    }
    paths
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = Some(schema.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn page_size(mut self, size: u64) -> Self {
        self.config.page_size = size;
        self
    }

    /// Validate and build.
    pub fn build(self) -> SqlRestResult<StoreConfig> {
        self.config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config = StoreConfig::from_toml_str(
            r#"
            [store]
            url = "https://abc.example.co/"
            api_key = "secret"
            schema = "analytics"
            "#,
        )
        .unwrap();
        assert_eq!(config.schema.as_deref(), Some("analytics"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.page_size, 1000);
        assert_eq!(
            config.table_url("calls"),
            "https://abc.example.co/rest/v1/calls"
        );
    }

    #[test]
    fn test_missing_store_table() {
        let err = StoreConfig::from_toml_str("url = 'x'").unwrap_err();
        assert!(matches!(err, SqlRestError::Config(_)));
    }

    #[test]
    fn test_builder_validates() {
        let err = StoreConfig::builder().url("https://x.co").build().unwrap_err();
        assert!(matches!(err, SqlRestError::Config(_)));

        let err = StoreConfig::builder()
            .url("ftp://x.co")
            .api_key("k")
            .build()
            .unwrap_err();
        assert!(matches!(err, SqlRestError::Config(_)));

        let config = StoreConfig::builder()
            .url("http://localhost:54321")
            .api_key("k")
            .page_size(50)
            .build()
            .unwrap();
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = StoreConfig::builder()
            .url("https://x.co")
            .api_key("super-secret")
            .build()
            .unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}

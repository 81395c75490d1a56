//! Harness configuration

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Prefix for environment variables that override configured properties
pub const ENV_PREFIX: &str = "LIBRARY_E2E_";

/// Opaque key/value lookup used for per-role credentials
pub trait KeyValueStore: Send + Sync {
    fn property(&self, key: &str) -> Option<String>;
}

impl KeyValueStore for HashMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl KeyValueStore for BTreeMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the REST API (e.g. `https://library.example/rest/v1`)
    pub api_base_url: String,

    /// Base URL of the web UI
    pub ui_base_url: String,

    /// Path to the application database
    pub database_path: PathBuf,

    /// Timeouts for every suspension point
    pub timeouts: TimeoutConfig,

    /// Browser configuration
    pub browser: BrowserConfig,

    /// Flat property table (`librarian_username`, `student_password`, ...)
    pub properties: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/rest/v1".to_string(),
            ui_base_url: "http://127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("library.db"),
            timeouts: TimeoutConfig::default(),
            browser: BrowserConfig::default(),
            properties: BTreeMap::new(),
        }
    }
}

/// Timeouts, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout for API calls
    pub http_ms: u64,

    /// Visibility wait before every UI interaction
    pub ui_wait_ms: u64,

    /// SQLite busy timeout
    pub db_busy_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_ms: 10_000,
            ui_wait_ms: 5_000,
            db_busy_ms: 5_000,
        }
    }
}

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// chromium, firefox or webkit
    pub engine: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Deadline for one browser script, on top of any wait it performs
    pub script_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: "chromium".to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            script_timeout_ms: 30_000,
        }
    }
}

impl BrowserConfig {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.http_ms)
    }

    pub fn ui_wait(&self) -> Duration {
        Duration::from_millis(self.timeouts.ui_wait_ms)
    }

    pub fn db_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.db_busy_ms)
    }
}

impl KeyValueStore for HarnessConfig {
    /// Environment (`LIBRARY_E2E_LIBRARIAN_USERNAME`) wins over the file
    fn property(&self, key: &str) -> Option<String> {
        let env_key = format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase());
        std::env::var(env_key)
            .ok()
            .or_else(|| self.properties.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let config = HarnessConfig::from_toml(
            r#"
api_base_url = "https://library.test/rest/v1"

[timeouts]
ui_wait_ms = 250

[properties]
librarian_username = "librarian1@library"
librarian_password = "secret"
"#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://library.test/rest/v1");
        assert_eq!(config.ui_wait(), Duration::from_millis(250));
        // untouched sections keep their defaults
        assert_eq!(config.timeouts.http_ms, 10_000);
        assert_eq!(config.browser.engine, "chromium");
        assert_eq!(config.browser.script_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.property("librarian_username").as_deref(),
            Some("librarian1@library")
        );
        assert_eq!(config.property("student_username"), None);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.timeouts.ui_wait_ms, 5_000);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");
        std::fs::write(&path, "timeouts = 3").unwrap();
        let err = HarnessConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Config);
    }
}

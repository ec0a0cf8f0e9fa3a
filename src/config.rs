//! Configuration
//!
//! `BoardConfig` is read from a JSON file (`board_config.json` unless a path
//! is given) and then overridden by `LINKUP_*` environment variables. Missing
//! fields take their defaults.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "board_config.json";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_RECONCILE_DELAY_MS: u64 = 2000;
pub const DEFAULT_CREATE_CHECK_DELAY_MS: u64 = 1000;

pub const ENV_API_URL: &str = "LINKUP_API_URL";
pub const ENV_WORKSPACE: &str = "LINKUP_WORKSPACE";
pub const ENV_ACCESS_TOKEN: &str = "LINKUP_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "LINKUP_REFRESH_TOKEN";
pub const ENV_RECONCILE_DELAY_MS: &str = "LINKUP_RECONCILE_DELAY_MS";
pub const ENV_CREATE_CHECK_DELAY_MS: &str = "LINKUP_CREATE_CHECK_DELAY_MS";
pub const ENV_LOG_DIR: &str = "LINKUP_LOG_DIR";
pub const ENV_LEGACY_ID_MATCHING: &str = "LINKUP_LEGACY_ID_MATCHING";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub api_base_url: String,
    pub workspace_slug: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub reconcile_delay_ms: u64,
    /// Wait before checking whether a failed create reached the server
    pub create_check_delay_ms: u64,
    /// Transport default when unset
    pub request_timeout_secs: Option<u64>,
    pub legacy_id_matching: bool,
    pub log_dir: PathBuf,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            workspace_slug: String::new(),
            access_token: None,
            refresh_token: None,
            reconcile_delay_ms: DEFAULT_RECONCILE_DELAY_MS,
            create_check_delay_ms: DEFAULT_CREATE_CHECK_DELAY_MS,
            request_timeout_secs: None,
            legacy_id_matching: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl BoardConfig {
    /// Load the file and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `board_config.json` in the
    /// working directory is used if present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `LINKUP_*` overrides through `lookup`; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(slug) = get(ENV_WORKSPACE) {
            self.workspace_slug = slug;
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(token) = get(ENV_REFRESH_TOKEN) {
            self.refresh_token = Some(token);
        }
        if let Some(delay) = get(ENV_RECONCILE_DELAY_MS) {
            self.reconcile_delay_ms = parse_value(ENV_RECONCILE_DELAY_MS, &delay)?;
        }
        if let Some(delay) = get(ENV_CREATE_CHECK_DELAY_MS) {
            self.create_check_delay_ms = parse_value(ENV_CREATE_CHECK_DELAY_MS, &delay)?;
        }
        if let Some(dir) = get(ENV_LOG_DIR) {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(flag) = get(ENV_LEGACY_ID_MATCHING) {
            self.legacy_id_matching = parse_flag(ENV_LEGACY_ID_MATCHING, &flag)?;
        }
        Ok(())
    }

    /// Check the settings needed to talk to the backend
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if self.workspace_slug.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "workspace_slug is not set".to_string(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{key}={value}: {e}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{key}={value}: expected a boolean"))),
    }
}

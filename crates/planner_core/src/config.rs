//! Planner configuration.
//!
//! # Responsibility
//! - Deserialize TOML configuration with defaults for every section.
//! - Validate values before any session is built from them.
//!
//! # Invariants
//! - A missing section behaves exactly like an empty one.
//! - `max_in_flight_pushes` is at least 1 after validation.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_IN_FLIGHT_PUSHES: usize = 4;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse {
                path: Some(path),
                message,
            } => write!(f, "failed to parse config `{}`: {message}", path.display()),
            Self::Parse { path: None, message } => write!(f, "failed to parse config: {message}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { .. } | Self::Invalid(_) => None,
        }
    }
}

/// Remote store endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.example.co`. Empty means offline.
    pub base_url: String,
    /// Public (anon) api key sent with every request.
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RemoteConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}

/// Local cache medium location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite file path; `None` keeps the cache in memory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on concurrently running background tasks.
    pub max_in_flight_pushes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_in_flight_pushes: DEFAULT_MAX_IN_FLIGHT_PUSHES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; defaults by build mode.
    pub level: Option<String>,
    /// Absolute log directory; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

impl PlannerConfig {
    /// Loads and validates a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: None,
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.remote.is_configured() {
            let url = self.remote.base_url.trim();
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::Invalid(format!(
                    "remote.base_url must start with http:// or https://, got `{url}`"
                )));
            }
            if self.remote.timeout_secs == 0 {
                return Err(ConfigError::Invalid(
                    "remote.timeout_secs must be positive".to_string(),
                ));
            }
        }
        if let Some(path) = &self.cache.path {
            if !path.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "cache.path must be absolute, got `{}`",
                    path.display()
                )));
            }
        }
        if self.sync.max_in_flight_pushes == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_in_flight_pushes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PlannerConfig};
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PlannerConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, PlannerConfig::default());
        assert_eq!(config.sync.max_in_flight_pushes, 4);
        assert_eq!(config.remote.timeout_secs, 15);
        assert!(!config.remote.is_configured());
    }

    #[test]
    fn parses_all_sections() {
        let config = PlannerConfig::from_toml_str(
            r#"
            [remote]
            base_url = "https://planner.example.com"
            api_key = "anon"

            [cache]
            path = "/var/lib/planner/cache.sqlite3"

            [sync]
            max_in_flight_pushes = 2

            [logging]
            level = "warn"
            "#,
        )
        .expect("config should parse");

        assert!(config.remote.is_configured());
        assert_eq!(config.remote.timeout_secs, 15);
        assert_eq!(config.sync.max_in_flight_pushes, 2);
        assert_eq!(config.logging.level.as_deref(), Some("warn"));
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn rejects_relative_cache_path_and_bad_url() {
        let err = PlannerConfig::from_toml_str("[cache]\npath = \"cache.db\"")
            .expect_err("relative path must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = PlannerConfig::from_toml_str("[remote]\nbase_url = \"ftp://x\"")
            .expect_err("non-http url must fail");
        assert!(err.to_string().contains("base_url"));

        let err = PlannerConfig::from_toml_str("[sync]\nmax_in_flight_pushes = 0")
            .expect_err("zero bound must fail");
        assert!(err.to_string().contains("max_in_flight_pushes"));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"[remote\n").expect("write config");

        let err = PlannerConfig::load(file.path()).expect_err("broken toml must fail");
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path.as_deref(), Some(file.path())),
            other => panic!("unexpected error: {other}"),
        }
    }
}

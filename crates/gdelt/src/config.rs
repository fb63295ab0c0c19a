//! Layered configuration.
//!
//! Settings resolve in priority order: explicit constructor values, then
//! `GDELT_*` environment variables, then the TOML config file (default
//! `~/.gdelt/config.toml`), then documented defaults.

use crate::error::Error;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "GDELT_";

/// Fully-resolved engine configuration.
#[derive(Debug, Clone)]
pub struct GdeltConfig {
    /// Billing project for warehouse queries. Unset disables the warehouse.
    pub warehouse_project: Option<String>,
    /// Service-account key path, resolved against `credentials_parent`.
    pub credentials_path: Option<PathBuf>,
    /// Pre-issued bearer token (ambient credentials). Takes precedence over
    /// the key file.
    pub credentials_token: Option<String>,
    /// Directory credential paths must stay under.
    pub credentials_parent: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub fallback_enabled: bool,
    pub max_concurrent_downloads: usize,
    pub extra_allowed_hosts: Vec<String>,
    /// Optional overall warehouse query deadline.
    pub query_timeout: Option<Duration>,
}

impl Default for GdeltConfig {
    fn default() -> Self {
        GdeltConfig {
            warehouse_project: None,
            credentials_path: None,
            credentials_token: None,
            credentials_parent: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            cache_dir: None,
            cache_ttl: Duration::from_secs(3600),
            max_retries: 5,
            request_timeout: Duration::from_secs(30),
            fallback_enabled: true,
            max_concurrent_downloads: 10,
            extra_allowed_hosts: Vec::new(),
            query_timeout: None,
        }
    }
}

/// A partial configuration: every field optional. Overlays merge with
/// earlier (higher-priority) values winning.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    pub warehouse_project: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub credentials_token: Option<String>,
    pub credentials_parent: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    #[serde(default, with = "humantime_serde")]
    pub cache_ttl: Option<Duration>,
    pub max_retries: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub fallback_enabled: Option<bool>,
    pub max_concurrent_downloads: Option<usize>,
    pub extra_allowed_hosts: Option<Vec<String>>,
    #[serde(default, with = "humantime_serde")]
    pub query_timeout: Option<Duration>,
}

impl ConfigOverlay {
    /// Merges `other` underneath `self`: fields already set here win.
    fn or(mut self, other: ConfigOverlay) -> ConfigOverlay {
        self.warehouse_project = self.warehouse_project.or(other.warehouse_project);
        self.credentials_path = self.credentials_path.or(other.credentials_path);
        self.credentials_token = self.credentials_token.or(other.credentials_token);
        self.credentials_parent = self.credentials_parent.or(other.credentials_parent);
        self.cache_dir = self.cache_dir.or(other.cache_dir);
        self.cache_ttl = self.cache_ttl.or(other.cache_ttl);
        self.max_retries = self.max_retries.or(other.max_retries);
        self.request_timeout = self.request_timeout.or(other.request_timeout);
        self.fallback_enabled = self.fallback_enabled.or(other.fallback_enabled);
        self.max_concurrent_downloads = self
            .max_concurrent_downloads
            .or(other.max_concurrent_downloads);
        self.extra_allowed_hosts = self.extra_allowed_hosts.or(other.extra_allowed_hosts);
        self.query_timeout = self.query_timeout.or(other.query_timeout);
        self
    }

    /// Reads the `GDELT_*` environment.
    fn from_env() -> ConfigOverlay {
        fn var(name: &str) -> Option<String> {
            std::env::var(format!("{ENV_PREFIX}{name}"))
                .ok()
                .filter(|v| !v.is_empty())
        }
        ConfigOverlay {
            warehouse_project: var("PROJECT_ID"),
            credentials_path: var("CREDENTIALS").map(PathBuf::from),
            credentials_token: var("BQ_TOKEN"),
            credentials_parent: var("CREDENTIALS_PARENT").map(PathBuf::from),
            cache_dir: var("CACHE_DIR").map(PathBuf::from),
            cache_ttl: var("CACHE_TTL").and_then(|v| parse_duration(&v)),
            max_retries: var("MAX_RETRIES").and_then(|v| v.parse().ok()),
            request_timeout: var("TIMEOUT").and_then(|v| parse_duration(&v)),
            fallback_enabled: var("FALLBACK").and_then(|v| parse_bool(&v)),
            max_concurrent_downloads: var("MAX_CONCURRENT").and_then(|v| v.parse().ok()),
            extra_allowed_hosts: var("EXTRA_HOSTS")
                .map(|v| v.split(',').map(|h| h.trim().to_string()).collect()),
            query_timeout: var("QUERY_TIMEOUT").and_then(|v| parse_duration(&v)),
        }
    }

    fn from_file(path: &std::path::Path) -> Result<ConfigOverlay, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| Error::Config {
            detail: format!("cannot read {}: {err}", path.display()),
        })?;
        toml::from_str(&text).map_err(|err| Error::Config {
            detail: format!("invalid config file {}: {err}", path.display()),
        })
    }

    /// Resolves this overlay (the constructor layer) against environment,
    /// file, and defaults.
    pub fn resolve(self) -> Result<GdeltConfig, Error> {
        let mut merged = self.or(ConfigOverlay::from_env());

        let file = std::env::var(format!("{ENV_PREFIX}CONFIG"))
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".gdelt").join("config.toml")));
        if let Some(path) = file {
            if path.is_file() {
                merged = merged.or(ConfigOverlay::from_file(&path)?);
            }
        }

        let defaults = GdeltConfig::default();
        Ok(GdeltConfig {
            warehouse_project: merged.warehouse_project,
            credentials_path: merged.credentials_path,
            credentials_token: merged.credentials_token,
            credentials_parent: merged
                .credentials_parent
                .unwrap_or(defaults.credentials_parent),
            cache_dir: merged.cache_dir,
            cache_ttl: merged.cache_ttl.unwrap_or(defaults.cache_ttl),
            max_retries: merged.max_retries.unwrap_or(defaults.max_retries),
            request_timeout: merged.request_timeout.unwrap_or(defaults.request_timeout),
            fallback_enabled: merged.fallback_enabled.unwrap_or(defaults.fallback_enabled),
            max_concurrent_downloads: merged
                .max_concurrent_downloads
                .unwrap_or(defaults.max_concurrent_downloads),
            extra_allowed_hosts: merged.extra_allowed_hosts.unwrap_or_default(),
            query_timeout: merged.query_timeout,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Durations in env vars accept either plain seconds or humantime forms
/// ("90", "1h 30m").
fn parse_duration(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    humantime_serde::re::humantime::parse_duration(value).ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_layer_parses_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
warehouse_project = "my-project"
cache_ttl = "30m"
max_concurrent_downloads = 4
extra_allowed_hosts = ["mirror.example"]
"#,
        )
        .unwrap();
        let overlay = ConfigOverlay::from_file(&path).unwrap();
        assert_eq!(overlay.warehouse_project.as_deref(), Some("my-project"));
        assert_eq!(overlay.cache_ttl, Some(Duration::from_secs(1800)));
        assert_eq!(overlay.max_concurrent_downloads, Some(4));
    }

    #[test]
    fn constructor_layer_wins_over_file_layer() {
        let high = ConfigOverlay {
            max_retries: Some(2),
            ..Default::default()
        };
        let low = ConfigOverlay {
            max_retries: Some(9),
            warehouse_project: Some("from-file".to_string()),
            ..Default::default()
        };
        let merged = high.or(low);
        assert_eq!(merged.max_retries, Some(2));
        assert_eq!(merged.warehouse_project.as_deref(), Some("from-file"));
    }

    #[test]
    fn duration_env_forms() {
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("nope"), None);
    }
}

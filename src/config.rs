// Runtime configuration, read from the environment
//
// Everything has a sensible default so `repo-cmdb query ...` works with no setup.
// The completion backend only switches on when GEMINI_API_KEY is present.

use crate::error::{CatalogError, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "CMDB_DB_PATH";
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_BACKEND_TIMEOUT_MS: &str = "CMDB_BACKEND_TIMEOUT_MS";
pub const ENV_CACHE_CAPACITY: &str = "CMDB_CACHE_CAPACITY";
pub const ENV_PATTERNS_FILE: &str = "CMDB_PATTERNS_FILE";
pub const ENV_CLONE_TIMEOUT_SECS: &str = "CMDB_CLONE_TIMEOUT_SECS";

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub backend_timeout: Duration,
    /// None means the query cache grows without bound
    pub cache_capacity: Option<usize>,
    pub patterns_file: Option<PathBuf>,
    pub clone_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = match get(ENV_DB_PATH) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        let backend_timeout_ms = parse_number(ENV_BACKEND_TIMEOUT_MS, get(ENV_BACKEND_TIMEOUT_MS))?
            .unwrap_or(DEFAULT_BACKEND_TIMEOUT_MS);
        if backend_timeout_ms == 0 {
            return Err(CatalogError::Config(format!(
                "{} must be greater than zero",
                ENV_BACKEND_TIMEOUT_MS
            )));
        }

        let cache_capacity = parse_number(ENV_CACHE_CAPACITY, get(ENV_CACHE_CAPACITY))?
            .map(|n| n as usize)
            .filter(|n| *n > 0);

        let clone_timeout_secs = parse_number(ENV_CLONE_TIMEOUT_SECS, get(ENV_CLONE_TIMEOUT_SECS))?
            .unwrap_or(DEFAULT_CLONE_TIMEOUT_SECS);

        Ok(Self {
            db_path,
            api_key: get(ENV_API_KEY),
            model: get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get(ENV_BASE_URL),
            backend_timeout: Duration::from_millis(backend_timeout_ms),
            cache_capacity,
            patterns_file: get(ENV_PATTERNS_FILE).map(PathBuf::from),
            clone_timeout: Duration::from_secs(clone_timeout_secs),
        })
    }

    /// Override the database location (the `--db` flag wins over the env)
    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.db_path = path;
        }
        self
    }
}

fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        CatalogError::Config("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".repo-cmdb").join("catalog.db"))
}

fn parse_number(key: &str, value: Option<String>) -> Result<Option<u64>> {
    value
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                CatalogError::Config(format!("{} must be a whole number, got '{}'", key, raw))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[(ENV_DB_PATH, "/tmp/catalog.db")]).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/catalog.db"));
        assert!(config.api_key.is_none());
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.backend_timeout, Duration::from_millis(15_000));
        assert!(config.cache_capacity.is_none());
        assert_eq!(config.clone_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_DB_PATH, "/tmp/x.db"),
            (ENV_API_KEY, "secret"),
            (ENV_MODEL, "gemini-pro"),
            (ENV_BACKEND_TIMEOUT_MS, "2500"),
            (ENV_CACHE_CAPACITY, "128"),
            (ENV_PATTERNS_FILE, "/etc/cmdb/patterns.json"),
        ])
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.model, "gemini-pro");
        assert_eq!(config.backend_timeout, Duration::from_millis(2500));
        assert_eq!(config.cache_capacity, Some(128));
        assert_eq!(
            config.patterns_file,
            Some(PathBuf::from("/etc/cmdb/patterns.json"))
        );
    }

    #[test]
    fn test_blank_key_is_unset() {
        let config = config_from(&[(ENV_DB_PATH, "/tmp/x.db"), (ENV_API_KEY, "   ")]).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_number_rejected() {
        let result = config_from(&[(ENV_DB_PATH, "/tmp/x.db"), (ENV_CACHE_CAPACITY, "lots")]);
        match result {
            Err(CatalogError::Config(msg)) => assert!(msg.contains(ENV_CACHE_CAPACITY)),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = config_from(&[(ENV_DB_PATH, "/tmp/x.db"), (ENV_BACKEND_TIMEOUT_MS, "0")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_db_path_flag_wins() {
        let config = config_from(&[(ENV_DB_PATH, "/tmp/env.db")])
            .unwrap()
            .with_db_path(Some(PathBuf::from("/tmp/flag.db")));
        assert_eq!(config.db_path, PathBuf::from("/tmp/flag.db"));
    }
}

// Application settings: defaults overridden by environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://kambio-server.onrender.com/api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the rate service (`/rates`, `/history`, `/trend`)
    pub api_url: String,
    /// SQLite file holding alerts and the last fetched rates
    pub db_path: PathBuf,
    /// Log directory for the TUI (stderr is used by one-shot commands)
    pub log_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            db_path: PathBuf::from("kambio.db"),
            log_dir: PathBuf::from("logs"),
            request_timeout_secs: 15,
        }
    }
}

impl Config {
    /// Defaults + `KAMBIO_*` environment overrides. A `.env` file is loaded
    /// first when present; variables already set win over it.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("KAMBIO_API_URL") {
            config.api_url = url;
        }
        if let Some(path) = lookup("KAMBIO_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("KAMBIO_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("KAMBIO_TIMEOUT_SECS") {
            config.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("KAMBIO_TIMEOUT_SECS must be a number of seconds, got {:?}", secs))?;
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("KAMBIO_API_URL", "http://localhost:3000/api"),
            ("KAMBIO_DB_PATH", "/tmp/kambio-test.db"),
            ("KAMBIO_TIMEOUT_SECS", " 5 "),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "http://localhost:3000/api");
        assert_eq!(config.db_path, PathBuf::from("/tmp/kambio-test.db"));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_from_env_reads_dotenv_file() {
        let path = std::env::temp_dir().join(format!("kambio-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, "KAMBIO_LOG_DIR=/tmp/kambio-dotenv-logs\n").unwrap();

        dotenvy::from_path(&path).unwrap();
        let config = Config::from_env().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/tmp/kambio-dotenv-logs"));
    }

    #[test]
    fn test_bad_timeout_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[("KAMBIO_TIMEOUT_SECS", "soon")]));
        assert!(result.is_err());
    }
}

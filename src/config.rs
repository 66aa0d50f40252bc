// src/config.rs

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Process configuration, loaded entirely from environment variables per
/// the external interface table — there is no config file and no CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub sink_database_url: String,
    pub sink_max_connections: u32,
    pub sink_collection: String,

    pub fetch_interval_secs: u64,
    pub batch_size: u32,
    pub cache_maxsize: usize,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub ct_log_list_url: String,
    pub include_readonly: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            sink_database_url: env_string("SINK_DATABASE_URL", "postgres://localhost/ct_tailer"),
            sink_max_connections: env_parsed("SINK_MAX_CONNECTIONS", 10)?,
            sink_collection: env_string("SINK_COLLECTION", "certificates"),

            fetch_interval_secs: env_parsed("FETCH_INTERVAL", 60)?,
            batch_size: env_parsed("BATCH_SIZE", 256)?,
            cache_maxsize: env_parsed("CACHE_MAXSIZE", 100_000)?,
            cache_ttl_secs: env_parsed("CACHE_TTL", 3600)?,
            request_timeout_secs: env_parsed("REQUEST_TIMEOUT", 10)?,
            ct_log_list_url: env_string(
                "CT_LOG_LIST_URL",
                "https://www.gstatic.com/ct/log_list/v3/log_list.json",
            ),
            include_readonly: env_parsed("CT_LOG_INCLUDE_READONLY", false)?,
        })
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{name}: invalid value {raw:?}: {e}"))
            .context("failed to parse environment variable"),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        for var in [
            "SINK_DATABASE_URL",
            "SINK_MAX_CONNECTIONS",
            "SINK_COLLECTION",
            "FETCH_INTERVAL",
            "BATCH_SIZE",
            "CACHE_MAXSIZE",
            "CACHE_TTL",
            "REQUEST_TIMEOUT",
            "CT_LOG_LIST_URL",
            "CT_LOG_INCLUDE_READONLY",
        ] {
            env::remove_var(var);
        }
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.fetch_interval_secs, 60);
        assert_eq!(cfg.batch_size, 256);
        assert_eq!(cfg.cache_maxsize, 100_000);
        assert_eq!(cfg.cache_ttl_secs, 3600);
        assert_eq!(cfg.request_timeout_secs, 10);
        assert_eq!(
            cfg.ct_log_list_url,
            "https://www.gstatic.com/ct/log_list/v3/log_list.json"
        );
        assert!(!cfg.include_readonly);
    }

    #[test]
    fn invalid_numeric_value_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("BATCH_SIZE", "not-a-number");
        let err = Config::from_env().unwrap_err();
        assert!(format!("{err:#}").contains("BATCH_SIZE"));
        env::remove_var("BATCH_SIZE");
    }
}

use std::{env, str::FromStr, time::Duration};

use super::env::{
    AppConfig, ConfigError, DetectionConfig, DirectoryConfig, FetchConfig, InputConfig,
    LoggingConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut detection = DetectionConfig::default();
        if let Some(workers) = parse_var::<usize>("MAX_WORKERS", var("MAX_WORKERS"))? {
            detection.set_max_workers(workers)?;
        }
        if let Some(ms) = parse_var::<u64>("PACING_DELAY_MS", var("PACING_DELAY_MS"))? {
            detection.pacing_delay = Duration::from_millis(ms);
        }

        let mut fetch = FetchConfig::default();
        if let Some(secs) = parse_var::<u64>("FETCH_TIMEOUT_SECS", var("FETCH_TIMEOUT_SECS"))? {
            fetch.set_timeout_secs(secs)?;
        }
        if let Some(agent) = var("BROWSER_USER_AGENT") {
            fetch.user_agent = agent;
        }

        let input = InputConfig {
            url_column: var("URL_COLUMN"),
        };

        let directories = DirectoryConfig {
            logs_dir: var("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
        };

        let logging = LoggingConfig {
            level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            detection,
            fetch,
            input,
            directories,
            logging,
        })
    }
}

fn parse_var<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|err| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: err.to_string(),
            })
        })
        .transpose()
}

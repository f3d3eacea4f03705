use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const WORKERS_RANGE: (usize, usize) = (1, 10);
pub const TIMEOUT_SECS_RANGE: (u64, u64) = (5, 30);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub fetch: FetchConfig,
    pub input: InputConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub max_workers: usize,
    pub pacing_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InputConfig {
    pub url_column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            pacing_delay: Duration::from_millis(100),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

impl DetectionConfig {
    pub fn set_max_workers(&mut self, value: usize) -> Result<(), ConfigError> {
        self.max_workers = check_range("MAX_WORKERS", value, WORKERS_RANGE)?;
        Ok(())
    }
}

impl FetchConfig {
    pub fn set_timeout_secs(&mut self, value: u64) -> Result<(), ConfigError> {
        let secs = check_range("FETCH_TIMEOUT_SECS", value, TIMEOUT_SECS_RANGE)?;
        self.timeout = Duration::from_secs(secs);
        Ok(())
    }
}

pub(crate) fn check_range<T>(key: &'static str, value: T, (min, max): (T, T)) -> Result<T, ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: format!("must be between {min} and {max}"),
        });
    }
    Ok(value)
}

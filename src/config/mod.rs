pub mod env;
mod loader;

pub use env::{
    AppConfig, ConfigError, DetectionConfig, DirectoryConfig, FetchConfig, InputConfig,
    LoggingConfig,
};
pub use loader::load_config;

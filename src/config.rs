use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::logging::RequestLoggerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

/// Settings for the demo server, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub env: String,
    pub log_format: LogFormat,
    pub request_logger: RequestLoggerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            None => 8000,
        };

        let env = lookup("APP_ENV").unwrap_or_else(|| "development".to_string());

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };

        let mut request_logger = RequestLoggerConfig::default();
        if let Some(level) = lookup("REQUEST_LOG_LEVEL") {
            request_logger.level = level.parse()?;
        }
        if let Some(value) = lookup("REQUEST_LOG_TIME_LIMIT") {
            let millis = value
                .parse()
                .map_err(|source| ConfigError::InvalidTimeLimit { value, source })?;
            request_logger.time_limit = Some(millis);
        }
        if let Some(value) = lookup("REQUEST_LOG_CATCH_ERRORS") {
            request_logger.catch_errors = parse_flag(&value)?;
        }

        Ok(Self {
            port,
            env,
            log_format,
            request_logger,
        })
    }
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag(value.to_string())),
    }
}

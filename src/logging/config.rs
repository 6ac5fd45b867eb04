use serde::{Deserialize, Serialize};

use crate::logging::level::Level;

/// Largest body, in bytes, the request logger buffers for a log entry.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Settings for a [`RequestLogger`](crate::logging::middleware::RequestLogger).
///
/// Deserializes from the same keys the middleware has always accepted:
/// `level`, `timeLimit` (slow request threshold in ms), `catchErrors`, plus
/// `maxBodyBytes`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestLoggerConfig {
    /// Severity of regular request/response entries.
    pub level: Level,
    /// Responses slower than this many milliseconds are logged at `warn`.
    /// Zero disables slow detection, same as leaving it unset.
    pub time_limit: Option<u64>,
    /// Only log when the downstream chain fails, then hand the error back.
    pub catch_errors: bool,
    /// Bodies larger than this are passed through without being logged.
    pub max_body_bytes: usize,
}

impl Default for RequestLoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            time_limit: None,
            catch_errors: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl RequestLoggerConfig {
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_time_limit(mut self, millis: u64) -> Self {
        self.time_limit = Some(millis);
        self
    }

    pub fn with_catch_errors(mut self, catch_errors: bool) -> Self {
        self.catch_errors = catch_errors;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Bodies only ever make it into entries at debug level.
    pub fn logs_bodies(&self) -> bool {
        self.level == Level::Debug
    }

    /// Whether the request body has to be captured before handing it downstream.
    pub fn captures_request_body(&self) -> bool {
        self.logs_bodies() || self.catch_errors
    }

    pub fn is_slow(&self, elapsed_ms: u64) -> bool {
        match self.time_limit {
            Some(limit) if limit > 0 => elapsed_ms > limit,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RequestLoggerConfig::default();
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.time_limit, None);
        assert!(!config.catch_errors);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn reads_external_option_names() {
        let config: RequestLoggerConfig =
            serde_json::from_str(r#"{ "level": "debug", "timeLimit": 250, "catchErrors": true }"#).unwrap();

        assert_eq!(config.level, Level::Debug);
        assert_eq!(config.time_limit, Some(250));
        assert!(config.catch_errors);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);

        let empty: RequestLoggerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RequestLoggerConfig::default());
    }

    #[test]
    fn rejects_unknown_level_names() {
        let result = serde_json::from_str::<RequestLoggerConfig>(r#"{ "level": "loud" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn slow_detection_uses_strict_threshold() {
        let config = RequestLoggerConfig::default().with_time_limit(100);
        assert!(!config.is_slow(99));
        assert!(!config.is_slow(100));
        assert!(config.is_slow(101));

        assert!(!RequestLoggerConfig::default().is_slow(u64::MAX));
        assert!(!RequestLoggerConfig::default().with_time_limit(0).is_slow(5));
    }

    #[test]
    fn body_capture_follows_level_and_mode() {
        let info = RequestLoggerConfig::default();
        assert!(!info.logs_bodies());
        assert!(!info.captures_request_body());

        let debug = RequestLoggerConfig::default().with_level(Level::Debug);
        assert!(debug.logs_bodies());
        assert!(debug.captures_request_body());

        let catching = RequestLoggerConfig::default().with_catch_errors(true);
        assert!(!catching.logs_bodies());
        assert!(catching.captures_request_body());
    }
}

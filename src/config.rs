use crate::constants::{
    DEFAULT_PASSWORD, DEFAULT_POLL_INTERVAL_MS, DEFAULT_USERNAME, MAX_POLL_INTERVAL_MS,
};
use crate::error::{DHStreamError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Duration;

/// Settings that can be kept in a JSON file instead of on the command line.
///
/// Missing keys take their defaults, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub channel: u32,
    pub stream_type: i32,
    pub debug: bool,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            channel: 0,
            stream_type: 0,
            debug: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| DHStreamError::SerializationError(format!("Error parsing config: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// `poll_interval_ms` clamped to `1..=MAX_POLL_INTERVAL_MS`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(1, MAX_POLL_INTERVAL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_gives_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "password");
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn partial_file_overrides_some_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "operator", "channel": 3, "debug": true}}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.username, "operator");
        assert_eq!(config.channel, 3);
        assert!(config.debug);
        assert_eq!(config.password, "password");
        assert_eq!(config.stream_type, 0);
    }

    #[test]
    fn unknown_keys_and_bad_json_are_errors() {
        assert!(matches!(
            Config::from_json(r#"{"usernmae": "x"}"#),
            Err(DHStreamError::SerializationError(_))
        ));
        assert!(matches!(
            Config::from_json("not json"),
            Err(DHStreamError::SerializationError(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(DHStreamError::IoError(_))
        ));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn long_poll_interval_is_capped() {
        let config = Config::from_json(r#"{"poll_interval_ms": 600000}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));

        let config = Config::from_json(r#"{"poll_interval_ms": 250}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }
}

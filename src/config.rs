use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Keyword matched against announcement titles, case-insensitive.
    #[serde(default = "default_keyword")]
    keyword: String,
    /// Feed locale. English gives the most reliable keyword matches.
    #[serde(default = "default_locale")]
    locale: String,
    /// Announcement index endpoint.
    #[serde(default = "default_source_url")]
    source_url: String,
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    /// Seconds to wait after startup before the first poll.
    #[serde(default = "default_warmup_secs")]
    warmup_secs: u64,
    /// Milliseconds to pause between successive deliveries.
    #[serde(default = "default_send_delay_ms")]
    send_delay_ms: u64,
    /// Directory for state files (logs, persisted sets). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_keyword() -> String {
    "splash".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_source_url() -> String {
    "https://api.bybit.com/v5/announcements/index".to_string()
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_warmup_secs() -> u64 {
    10
}

fn default_send_delay_ms() -> u64 {
    100
}

pub struct Config {
    pub telegram_bot_token: String,
    pub keyword: String,
    pub locale: String,
    pub source_url: String,
    pub poll_interval: Duration,
    pub warmup: Duration,
    pub send_delay: Duration,
    /// Directory for state files (logs, persisted sets).
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        // Validate required fields
        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if file.keyword.trim().is_empty() {
            return Err(ConfigError::Validation("keyword must not be blank".into()));
        }
        if file.poll_interval_secs == 0 {
            return Err(ConfigError::Validation("poll_interval_secs must be positive".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            keyword: file.keyword,
            locale: file.locale,
            source_url: file.source_url,
            poll_interval: Duration::from_secs(file.poll_interval_secs),
            warmup: Duration::from_secs(file.warmup_secs),
            send_delay: Duration::from_millis(file.send_delay_ms),
            data_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config_with_defaults() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
        }"#);
        let config = Config::load(file.path()).expect("should load valid config");
        assert_eq!(config.keyword, "splash");
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.warmup, Duration::from_secs(10));
        assert_eq!(config.send_delay, Duration::from_millis(100));
        assert_eq!(config.data_dir, PathBuf::from("."));
    }

    #[test]
    fn test_overridden_fields() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "keyword": "listing",
            "poll_interval_secs": 60,
            "data_dir": "/var/lib/splashwatch"
        }"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.keyword, "listing");
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/splashwatch"));
    }

    #[test]
    fn test_empty_token() {
        let file = write_config(r#"{
            "telegram_bot_token": ""
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_missing_token_field() {
        let file = write_config(r#"{ "keyword": "splash" }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }

    #[test]
    fn test_invalid_token_format_no_colon() {
        let file = write_config(r#"{
            "telegram_bot_token": "invalid_token_no_colon"
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_invalid_token_format_non_numeric_id() {
        let file = write_config(r#"{
            "telegram_bot_token": "notanumber:ABCdef"
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_token_format_empty_secret() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:"
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_blank_keyword() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "keyword": "  "
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("keyword"));
    }

    #[test]
    fn test_zero_poll_interval() {
        let file = write_config(r#"{
            "telegram_bot_token": "123456789:ABCdef",
            "poll_interval_secs": 0
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load("/nonexistent/path/config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}

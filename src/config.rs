//! Scheduler configuration loaded from a `key = value` file.
//!
//! The file lives at `$XDG_CONFIG_HOME/chapter-queue/config.toml`, falling
//! back to `$HOME/.config/chapter-queue/config.toml`. Strings are
//! double-quoted and `#` starts a comment. Every key is optional; missing
//! keys keep their defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::auto_download::AutoDownloadPreferences;
use crate::backoff::{BackoffPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX};
use crate::dispatch::DEFAULT_CONCURRENCY;
use crate::queue::DEFAULT_STUCK_THRESHOLD;

const APP_DIR: &str = "chapter-queue";
const CONFIG_FILE: &str = "config.toml";

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "chapter-queue.db";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line is not of the form `key = value`.
    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax { line: usize },

    /// The key is not recognised.
    #[error("unknown configuration key: '{key}' on line {line}")]
    UnknownKey { key: String, line: usize },

    /// The value could not be parsed for its key.
    #[error("invalid `{key}` value on line {line}: {reason}")]
    InvalidValue {
        key: &'static str,
        line: usize,
        reason: String,
    },

    /// The value parsed but is outside the accepted range.
    #[error("invalid config value for `{key}`: {value}. Expected range: {range}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        range: String,
    },
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Age after which a `downloading` entry is considered abandoned.
    pub stuck_threshold_secs: u64,
    /// Pause between dispatcher passes.
    pub worker_interval_secs: u64,
    /// Parallel downloads per dispatcher.
    pub concurrency: usize,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub auto_download_enabled: bool,
    pub auto_download_lookback_days: u64,
    pub auto_download_chapters_per_manga: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            stuck_threshold_secs: DEFAULT_STUCK_THRESHOLD.as_secs(),
            worker_interval_secs: 60,
            concurrency: DEFAULT_CONCURRENCY,
            backoff_base_secs: DEFAULT_BACKOFF_BASE.as_secs(),
            backoff_max_secs: DEFAULT_BACKOFF_MAX.as_secs(),
            auto_download_enabled: false,
            auto_download_lookback_days: 7,
            auto_download_chapters_per_manga: 3,
        }
    }
}

impl QueueConfig {
    /// Loads the config file from the default location, or defaults when
    /// there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but is unreadable or invalid.
    pub fn load_default() -> Result<Self, ConfigError> {
        match resolve_default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw)?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Parses and validates config text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on syntax errors, unknown keys, or values out
    /// of range.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        for (index, raw_line) in raw.lines().enumerate() {
            let line = index + 1;
            let text = strip_inline_comment(raw_line).trim();
            if text.is_empty() {
                continue;
            }

            let Some((raw_key, raw_value)) = text.split_once('=') else {
                return Err(ConfigError::Syntax { line });
            };
            let value = raw_value.trim();

            match raw_key.trim() {
                "db_path" => cfg.db_path = PathBuf::from(parse_string("db_path", line, value)?),
                "stuck_threshold_secs" => {
                    cfg.stuck_threshold_secs = parse_u64("stuck_threshold_secs", line, value)?;
                }
                "worker_interval_secs" => {
                    cfg.worker_interval_secs = parse_u64("worker_interval_secs", line, value)?;
                }
                "concurrency" => {
                    let parsed = parse_u64("concurrency", line, value)?;
                    cfg.concurrency =
                        usize::try_from(parsed).map_err(|_| ConfigError::InvalidValue {
                            key: "concurrency",
                            line,
                            reason: "integer out of range".to_string(),
                        })?;
                }
                "backoff_base_secs" => {
                    cfg.backoff_base_secs = parse_u64("backoff_base_secs", line, value)?;
                }
                "backoff_max_secs" => {
                    cfg.backoff_max_secs = parse_u64("backoff_max_secs", line, value)?;
                }
                "auto_download_enabled" => {
                    cfg.auto_download_enabled = parse_bool("auto_download_enabled", line, value)?;
                }
                "auto_download_lookback_days" => {
                    cfg.auto_download_lookback_days =
                        parse_u64("auto_download_lookback_days", line, value)?;
                }
                "auto_download_chapters_per_manga" => {
                    cfg.auto_download_chapters_per_manga =
                        parse_u64("auto_download_chapters_per_manga", line, value)?;
                }
                unknown => {
                    return Err(ConfigError::UnknownKey {
                        key: unknown.to_string(),
                        line,
                    });
                }
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("stuck_threshold_secs", self.stuck_threshold_secs, 60, 86_400)?;
        check_range("worker_interval_secs", self.worker_interval_secs, 1, 3600)?;
        check_range(
            "concurrency",
            u64::try_from(self.concurrency).unwrap_or(u64::MAX),
            1,
            100,
        )?;
        check_range("backoff_base_secs", self.backoff_base_secs, 1, 3600)?;
        check_range(
            "backoff_max_secs",
            self.backoff_max_secs,
            self.backoff_base_secs,
            604_800,
        )?;
        check_range(
            "auto_download_lookback_days",
            self.auto_download_lookback_days,
            0,
            365,
        )?;
        check_range(
            "auto_download_chapters_per_manga",
            self.auto_download_chapters_per_manga,
            0,
            100,
        )?;
        Ok(())
    }

    /// Backoff policy built from the configured base and cap.
    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(self.backoff_base_secs),
            Duration::from_secs(self.backoff_max_secs),
        )
    }

    #[must_use]
    pub fn stuck_threshold(&self) -> Duration {
        Duration::from_secs(self.stuck_threshold_secs)
    }

    #[must_use]
    pub fn worker_interval(&self) -> Duration {
        Duration::from_secs(self.worker_interval_secs)
    }
}

impl AutoDownloadPreferences for QueueConfig {
    fn auto_download_enabled(&self) -> bool {
        self.auto_download_enabled
    }

    fn lookback_days(&self) -> i64 {
        i64::try_from(self.auto_download_lookback_days).unwrap_or(i64::MAX)
    }

    fn chapters_per_manga(&self) -> i64 {
        i64::try_from(self.auto_download_chapters_per_manga).unwrap_or(i64::MAX)
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/chapter-queue/config.toml`
/// 2. `$HOME/.config/chapter-queue/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn check_range(key: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            range: format!("{min}..={max}"),
        })
    }
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string(key: &'static str, line: usize, raw: &str) -> Result<String, ConfigError> {
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            line,
            reason: "expected double-quoted string".to_string(),
        })
}

fn parse_u64(key: &'static str, line: usize, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key,
        line,
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, line: usize, raw: &str) -> Result<bool, ConfigError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            line,
            reason: "expected 'true' or 'false'".to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let cfg = QueueConfig::parse("").expect("empty config should parse");
        assert_eq!(cfg, QueueConfig::default());
        assert_eq!(cfg.stuck_threshold(), Duration::from_secs(1800));
        assert_eq!(cfg.worker_interval(), Duration::from_secs(60));
        assert_eq!(cfg.concurrency, 2);
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = QueueConfig::parse(
            r#"
db_path = "/var/lib/manga/queue.db"
concurrency = 8
auto_download_enabled = true
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/manga/queue.db"));
        assert_eq!(cfg.concurrency, 8);
        assert!(cfg.auto_download_enabled);
        assert_eq!(cfg.auto_download_lookback_days, 7);
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = QueueConfig::parse(
            r#"
worker_interval_secs = 30 # twice a minute
db_path = "queue#1.db" # hash inside a string
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.worker_interval_secs, 30);
        assert_eq!(cfg.db_path, PathBuf::from("queue#1.db"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_concurrency() {
        let err = QueueConfig::parse("concurrency = 0").expect_err("invalid concurrency expected");
        assert!(err.to_string().contains("concurrency"));
        assert!(err.to_string().contains("1..=100"));
    }

    #[test]
    fn test_parse_config_rejects_stuck_threshold_below_a_minute() {
        let err = QueueConfig::parse("stuck_threshold_secs = 59").expect_err("too small");
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                key: "stuck_threshold_secs",
                value: 59,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_config_rejects_backoff_max_below_base() {
        let err = QueueConfig::parse("backoff_base_secs = 120\nbackoff_max_secs = 60")
            .expect_err("max below base");
        assert!(err.to_string().contains("backoff_max_secs"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = QueueConfig::parse("concurrency = 4 trailing").expect_err("trailing token");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "concurrency",
                line: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_config_rejects_negative_values() {
        let err = QueueConfig::parse("auto_download_lookback_days = -1").expect_err("negative");
        assert!(err.to_string().contains("auto_download_lookback_days"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = QueueConfig::parse("auto_download_enabled = yes").expect_err("bad boolean");
        assert!(err.to_string().contains("auto_download_enabled"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = QueueConfig::parse("db_path = queue.db").expect_err("unquoted string");
        assert!(err.to_string().contains("db_path"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = QueueConfig::parse("\nunknown_key = 123").expect_err("unknown key");
        assert!(matches!(err, ConfigError::UnknownKey { ref key, line: 2 } if key == "unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = QueueConfig::parse("concurrency 4").expect_err("syntax error");
        assert!(matches!(err, ConfigError::Syntax { line: 1 }));
    }

    #[test]
    fn test_backoff_policy_from_config() {
        let cfg = QueueConfig::parse("backoff_base_secs = 10\nbackoff_max_secs = 600")
            .expect("backoff config should parse");
        let policy = cfg.backoff_policy();
        assert_eq!(policy.base_delay(), Duration::from_secs(10));
        assert_eq!(policy.max_delay(), Duration::from_secs(600));
    }

    #[test]
    fn test_config_as_auto_download_preferences() {
        let cfg = QueueConfig::parse(
            "auto_download_enabled = true\nauto_download_lookback_days = 14\nauto_download_chapters_per_manga = 5",
        )
        .expect("auto-download config should parse");
        let prefs: &dyn AutoDownloadPreferences = &cfg;
        assert!(prefs.auto_download_enabled());
        assert_eq!(prefs.lookback_days(), 14);
        assert_eq!(prefs.chapters_per_manga(), 5);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "worker_interval_secs = 5\n").expect("write config");

        let cfg = QueueConfig::load(&path).expect("config file should load");
        assert_eq!(cfg.worker_interval_secs, 5);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = QueueConfig::load(Path::new("/nonexistent/chapter-queue/config.toml"))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

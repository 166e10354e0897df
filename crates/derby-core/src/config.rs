//! Configuration loading and typed config structures for Derby.
//!
//! The canonical configuration lives in `derby-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file at all)
//! yields a working setup: one race per minute on port 8080.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::race::RaceSettings;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Derby configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DerbyConfig {
    /// Lobby cadence and name rules.
    #[serde(default)]
    pub lobby: LobbyConfig,

    /// Race simulation parameters.
    #[serde(default)]
    pub race: RaceConfig,

    /// Timer periods.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DerbyConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// Environment variables override YAML values for the listen address:
    /// - `DERBY_HOST` overrides `observer.host`
    /// - `DERBY_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.observer.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml treats an empty document as null rather than an empty map.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lobby.interval_seconds == 0 {
            return Err(invalid("lobby.interval_seconds must be at least 1"));
        }
        if self.lobby.max_name_length == 0 {
            return Err(invalid("lobby.max_name_length must be at least 1"));
        }
        if self.scheduler.check_interval_ms == 0 {
            return Err(invalid("scheduler.check_interval_ms must be at least 1"));
        }
        if self.scheduler.lobby_refresh_interval_ms == 0 {
            return Err(invalid("scheduler.lobby_refresh_interval_ms must be at least 1"));
        }
        if self.race.tick_interval_ms == 0 {
            return Err(invalid("race.tick_interval_ms must be at least 1"));
        }
        if self.observer.stream_buffer == 0 {
            return Err(invalid("observer.stream_buffer must be at least 1"));
        }
        self.race.settings().map(|_| ())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// Lobby configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LobbyConfig {
    /// Races start on multiples of this many seconds since the epoch.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Longest accepted display name, in characters.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

impl LobbyConfig {
    /// The recurring start interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_name_length: default_max_name_length(),
        }
    }
}

/// Race configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RaceConfig {
    /// Progress value at which a participant finishes.
    #[serde(default = "default_finish_threshold")]
    pub finish_threshold: u32,

    /// Smallest per-tick advance (inclusive, at least 1).
    #[serde(default = "default_min_step")]
    pub min_step: u32,

    /// Largest per-tick advance (inclusive).
    #[serde(default = "default_max_step")]
    pub max_step: u32,

    /// Real-time milliseconds between race ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Fixed RNG seed for reproducible races. Unset means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RaceConfig {
    /// Validated engine settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the threshold or step range is
    /// unusable.
    pub fn settings(&self) -> Result<RaceSettings, ConfigError> {
        RaceSettings::new(self.finish_threshold, self.min_step, self.max_step)
    }

    /// The tick period as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            finish_threshold: default_finish_threshold(),
            min_step: default_min_step(),
            max_step: default_max_step(),
            tick_interval_ms: default_tick_interval_ms(),
            seed: None,
        }
    }
}

/// Scheduler timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// How often to check whether the lobby is due to start.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// How often to re-announce the lobby while it is open.
    #[serde(default = "default_lobby_refresh_interval_ms")]
    pub lobby_refresh_interval_ms: u64,
}

impl SchedulerConfig {
    /// Start-check period as a [`Duration`].
    pub const fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Lobby refresh period as a [`Duration`].
    pub const fn lobby_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.lobby_refresh_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            lobby_refresh_interval_ms: default_lobby_refresh_interval_ms(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-observer queue length before announcements are skipped.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Enable the dev-only force-start endpoint.
    #[serde(default)]
    pub allow_force_start: bool,
}

impl ObserverConfig {
    /// Apply `DERBY_HOST` / `DERBY_PORT` overrides. Unparseable ports are
    /// ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("DERBY_HOST") {
            self.host = host;
        }
        if let Ok(raw) = std::env::var("DERBY_PORT") {
            match raw.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(e) => tracing::warn!(value = raw, error = %e, "ignoring invalid DERBY_PORT"),
            }
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stream_buffer: default_stream_buffer(),
            allow_force_start: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_interval_seconds() -> u64 {
    60
}

const fn default_max_name_length() -> usize {
    20
}

const fn default_finish_threshold() -> u32 {
    100
}

const fn default_min_step() -> u32 {
    1
}

const fn default_max_step() -> u32 {
    10
}

const fn default_tick_interval_ms() -> u64 {
    500
}

const fn default_check_interval_ms() -> u64 {
    1000
}

const fn default_lobby_refresh_interval_ms() -> u64 {
    5000
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_stream_buffer() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DerbyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lobby.interval(), Duration::from_secs(60));
        assert_eq!(config.race.finish_threshold, 100);
        assert_eq!(config.scheduler.check_interval_ms, 1000);
        assert_eq!(config.scheduler.lobby_refresh_interval_ms, 5000);
        assert!(!config.observer.allow_force_start);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
lobby:
  interval_seconds: 30
  max_name_length: 12

race:
  finish_threshold: 50
  min_step: 2
  max_step: 5
  tick_interval_ms: 250
  seed: 42

scheduler:
  check_interval_ms: 500
  lobby_refresh_interval_ms: 2000

observer:
  host: "127.0.0.1"
  port: 9090
  stream_buffer: 8
  allow_force_start: true

logging:
  level: "debug"
  json: true
"#;

        let config = DerbyConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.lobby.interval_seconds, 30);
        assert_eq!(config.lobby.max_name_length, 12);
        assert_eq!(config.race.seed, Some(42));
        assert_eq!(config.race.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.scheduler.check_interval(), Duration::from_millis(500));
        assert_eq!(config.observer.port, 9090);
        assert!(config.observer.allow_force_start);
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = DerbyConfig::parse("race:\n  seed: 7\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.race.seed, Some(7));
        assert_eq!(config.race.max_step, 10);
        assert_eq!(config.lobby.max_name_length, 20);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(DerbyConfig::parse("").is_ok());
    }

    #[test]
    fn inverted_step_range_is_rejected() {
        let result = DerbyConfig::parse("race:\n  min_step: 6\n  max_step: 3\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_min_step_is_rejected() {
        let result = DerbyConfig::parse("race:\n  min_step: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = DerbyConfig::parse("lobby:\n  interval_seconds: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("derby-config.yaml");
        if path.exists() {
            let config = DerbyConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}

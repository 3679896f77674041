//! Server configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use talon_scheduler::{ConfigError, SchedulerConfig};

/// Contents of `talon.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Seconds between scheduler ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds of silence after which an agent counts as disconnected.
    pub disconnect_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_poll_interval_secs() -> u64 {
    4
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Validate the scheduler section.
    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        SchedulerConfig::new(
            Duration::from_secs(self.scheduler.poll_interval_secs),
            Duration::from_secs(self.scheduler.disconnect_timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_with_defaults() {
        let config = ServerConfig::parse("scheduler:\n  disconnect_timeout_secs: 30\n").unwrap();

        assert_eq!(config.scheduler.poll_interval_secs, 4);
        assert_eq!(config.log_format, LogFormat::Pretty);
        let scheduler = config.scheduler_config().unwrap();
        assert_eq!(scheduler.poll_interval(), Duration::from_secs(4));
        assert_eq!(scheduler.disconnect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_disconnect_timeout_is_required() {
        assert!(ServerConfig::parse("scheduler:\n  poll_interval_secs: 5\n").is_err());
    }

    #[test]
    fn test_out_of_range_poll_interval_rejected() {
        let config = ServerConfig::parse(
            "scheduler:\n  poll_interval_secs: 120\n  disconnect_timeout_secs: 30\n",
        )
        .unwrap();

        assert!(matches!(
            config.scheduler_config(),
            Err(ConfigError::PollIntervalOutOfRange { .. })
        ));
    }

    #[test]
    fn test_from_file_reads_json_log_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_format: json\nscheduler:\n  poll_interval_secs: 2\n  disconnect_timeout_secs: 15"
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.scheduler.poll_interval_secs, 2);
    }

    #[test]
    fn test_from_file_missing() {
        let err = ServerConfig::from_file(Path::new("/nonexistent/talon.yaml")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}

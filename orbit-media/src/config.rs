//! Simple configuration persistence for Orbit
//!
//! Stores user preferences: preferred input device, channel pool size,
//! recorder chunk cadence and the default log filter.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of channels in the pool
pub const DEFAULT_CHANNEL_COUNT: usize = 5;

/// Upper bound on the channel pool
pub const MAX_CHANNEL_COUNT: usize = 32;

/// Default recorder chunk cadence in milliseconds
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 500;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Input device name used when a recording names none
    pub input_device: Option<String>,
    /// Number of channels in the pool
    pub channel_count: usize,
    /// Recorder chunk cadence
    pub chunk_interval_ms: u64,
    /// tracing filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_device: None,
            channel_count: DEFAULT_CHANNEL_COUNT,
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("orbit")
            .join("config.txt")
    }

    /// Recorder chunk cadence as a Duration
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "input_device" => {
                    config.input_device = (!value.is_empty()).then(|| value.to_string());
                }
                "channel_count" => {
                    if let Ok(count) = value.parse::<usize>() {
                        if (1..=MAX_CHANNEL_COUNT).contains(&count) {
                            config.channel_count = count;
                        }
                    }
                }
                "chunk_interval_ms" => {
                    if let Ok(ms) = value.parse::<u64>() {
                        if (10..=10_000).contains(&ms) {
                            config.chunk_interval_ms = ms;
                        }
                    }
                }
                "log_filter" => {
                    if !value.is_empty() {
                        config.log_filter = value.to_string();
                    }
                }
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec!["# Orbit Configuration".to_string()];
        if let Some(ref device) = self.input_device {
            lines.push(format!("input_device={}", device));
        }
        lines.push(format!("channel_count={}", self.channel_count));
        lines.push(format!("chunk_interval_ms={}", self.chunk_interval_ms));
        lines.push(format!("log_filter={}", self.log_filter));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("");
        assert_eq!(config, Config::default());
        assert_eq!(config.channel_count, 5);
        assert_eq!(config.chunk_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_values() {
        let config = Config::parse(
            "input_device=USB Audio CODEC\nchannel_count=8\nchunk_interval_ms=250\nlog_filter=orbit_audio=debug",
        );
        assert_eq!(config.input_device.as_deref(), Some("USB Audio CODEC"));
        assert_eq!(config.channel_count, 8);
        assert_eq!(config.chunk_interval_ms, 250);
        assert_eq!(config.log_filter, "orbit_audio=debug");
    }

    #[test]
    fn test_parse_with_comments() {
        let content = "# Comment\nchannel_count=3\n# Another comment";
        let config = Config::parse(content);
        assert_eq!(config.channel_count, 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::parse("channel_count=0\nchunk_interval_ms=abc\ninput_device=");
        assert_eq!(config.channel_count, DEFAULT_CHANNEL_COUNT);
        assert_eq!(config.chunk_interval_ms, DEFAULT_CHUNK_INTERVAL_MS);
        assert!(config.input_device.is_none());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            input_device: Some("hw:1".to_string()),
            channel_count: 7,
            chunk_interval_ms: 200,
            log_filter: "warn".to_string(),
        };
        assert_eq!(Config::parse(&config.serialize()), config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("orbit-config-{}", std::process::id()));
        let path = dir.join("config.txt");
        let config = Config {
            channel_count: 4,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
        let _ = fs::remove_dir_all(&dir);
    }
}

//! Application preferences.
//!
//! JSON-persisted configuration for the sync engine and the overlay
//! display. A missing or malformed file falls back to defaults rather
//! than failing the application.

use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::countdown::CountMode;

/// Built-in time server list, in preference order.
pub const DEFAULT_SERVERS: [&str; 5] = [
    "time.google.com",
    "pool.ntp.org",
    "time.cloudflare.com",
    "time.windows.com",
    "time.apple.com",
];

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 180;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;

pub fn clamp_interval(minutes: u32) -> u32 {
    minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub selected_server: String,
    /// User-ordered server list; duplicates keep their first position.
    pub servers: Vec<String>,
    pub auto_sync: bool,
    /// Minutes between scheduled syncs, clamped to 1..=180 on load.
    pub interval_minutes: u32,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub font_scale: f32,
    pub show_millis: bool,
    pub progress_indicator: bool,
    pub pulse_speed: PulseSpeed,
    pub secondary_line: SecondaryLine,
    pub count_mode: CountMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseSpeed {
    Slow,
    Normal,
    Fast,
}

/// What the second overlay line shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecondaryLine {
    Hidden,
    Date,
    SyncInfo,
    NextEvent,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            selected_server: DEFAULT_SERVERS[0].to_string(),
            servers: DEFAULT_SERVERS.iter().map(|s| s.to_string()).collect(),
            auto_sync: true,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            display: DisplayConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            font_scale: 1.0,
            show_millis: true,
            progress_indicator: true,
            pulse_speed: PulseSpeed::Normal,
            secondary_line: SecondaryLine::Date,
            count_mode: CountMode::Three,
        }
    }
}

impl OverlayConfig {
    /// Loads from `path`. Missing file or malformed JSON yields defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return OverlayConfig::default(),
        };
        match serde_json::from_str::<OverlayConfig>(&raw) {
            Ok(config) => config.normalized(),
            Err(e) => {
                warn!(
                    "[Config] {} is malformed ({}), using defaults",
                    path.display(),
                    e
                );
                OverlayConfig::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// Clamps the interval, dedupes the server list (first occurrence
    /// wins) and makes sure the selected server is listed.
    pub fn normalized(mut self) -> Self {
        self.interval_minutes = clamp_interval(self.interval_minutes);

        let mut seen = Vec::with_capacity(self.servers.len());
        for server in self.servers.drain(..) {
            if !seen.contains(&server) {
                seen.push(server);
            }
        }
        self.servers = seen;

        if !self.servers.iter().any(|s| *s == self.selected_server) {
            self.servers.push(self.selected_server.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OverlayConfig::default();
        assert_eq!(config.selected_server, "time.google.com");
        assert_eq!(config.servers.len(), 5);
        assert!(config.auto_sync);
        assert_eq!(config.interval_minutes, 30);
        assert_eq!(config.display.font_scale, 1.0);
        assert!(config.display.show_millis);
        assert_eq!(config.display.count_mode, CountMode::Three);
    }

    #[test]
    fn test_clamp_interval() {
        assert_eq!(clamp_interval(0), 1);
        assert_eq!(clamp_interval(1), 1);
        assert_eq!(clamp_interval(60), 60);
        assert_eq!(clamp_interval(180), 180);
        assert_eq!(clamp_interval(1_000), 180);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = OverlayConfig::load(Path::new("/nonexistent/floatsync.json"));
        assert_eq!(config.interval_minutes, DEFAULT_INTERVAL_MINUTES);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ definitely not json").unwrap();
        let config = OverlayConfig::load(file.path());
        assert_eq!(config.selected_server, "time.google.com");
        assert_eq!(config.interval_minutes, DEFAULT_INTERVAL_MINUTES);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floatsync.json");

        let mut config = OverlayConfig::default();
        config.selected_server = "time.cloudflare.com".to_string();
        config.interval_minutes = 15;
        config.display.show_millis = false;
        config.display.secondary_line = SecondaryLine::SyncInfo;
        config.save(&path).unwrap();

        let loaded = OverlayConfig::load(&path);
        assert_eq!(loaded.selected_server, "time.cloudflare.com");
        assert_eq!(loaded.interval_minutes, 15);
        assert!(!loaded.display.show_millis);
        assert_eq!(loaded.display.secondary_line, SecondaryLine::SyncInfo);
    }

    #[test]
    fn test_normalized_clamps_and_dedupes() {
        let config = OverlayConfig {
            selected_server: "ntp.example.org".to_string(),
            servers: vec![
                "pool.ntp.org".to_string(),
                "time.google.com".to_string(),
                "pool.ntp.org".to_string(),
            ],
            interval_minutes: 999,
            ..Default::default()
        }
        .normalized();

        assert_eq!(config.interval_minutes, 180);
        assert_eq!(
            config.servers,
            vec!["pool.ntp.org", "time.google.com", "ntp.example.org"]
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"interval_minutes": 5}}"#).unwrap();
        let config = OverlayConfig::load(file.path());
        assert_eq!(config.interval_minutes, 5);
        assert_eq!(config.servers.len(), 5);
        assert!(config.display.progress_indicator);
    }
}

use serde::{Deserialize, Serialize};

use crate::config;
use crate::traits::SyncSample;

/// Process-wide sync status, read by the overlay and the status log.
/// Updated whole-value under a write lock; readers clone.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SyncState {
    /// Result of the most recent successful exchange.
    pub last_sample: Option<SyncSample>,
    pub is_syncing: bool,
    /// Message of the most recent failed exchange. Cleared on success.
    pub last_error: Option<String>,
    pub selected_server: String,
    /// User-ordered server list, first occurrence wins on duplicates.
    pub available_servers: Vec<String>,
    pub auto_sync_enabled: bool,
    pub interval_minutes: u32,
    pub next_sync_at_millis: Option<i64>,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState {
            last_sample: None,
            is_syncing: false,
            last_error: None,
            selected_server: config::DEFAULT_SERVERS[0].to_string(),
            available_servers: config::DEFAULT_SERVERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            auto_sync_enabled: true,
            interval_minutes: config::DEFAULT_INTERVAL_MINUTES,
            next_sync_at_millis: None,
        }
    }
}

impl SyncState {
    /// Seeds the state from persisted preferences.
    pub fn from_config(config: &config::OverlayConfig) -> Self {
        SyncState {
            selected_server: config.selected_server.clone(),
            available_servers: config.servers.clone(),
            auto_sync_enabled: config.auto_sync,
            interval_minutes: config.interval_minutes,
            ..Default::default()
        }
    }

    /// True once at least one exchange has succeeded.
    pub fn is_synchronized(&self) -> bool {
        self.last_sample.is_some()
    }

    /// Appends `server` to the ordered set; a duplicate keeps its
    /// original position.
    pub fn add_server(&mut self, server: &str) {
        if !self.available_servers.iter().any(|s| s == server) {
            self.available_servers.push(server.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = SyncState::default();
        assert!(!state.is_synchronized());
        assert!(!state.is_syncing);
        assert!(state.last_error.is_none());
        assert_eq!(state.selected_server, "time.google.com");
        assert_eq!(state.available_servers.len(), 5);
        assert!(state.auto_sync_enabled);
        assert!(state.next_sync_at_millis.is_none());
    }

    #[test]
    fn test_from_config_carries_preferences() {
        let mut cfg = config::OverlayConfig::default();
        cfg.selected_server = "time.apple.com".to_string();
        cfg.auto_sync = false;
        cfg.interval_minutes = 45;

        let state = SyncState::from_config(&cfg);
        assert_eq!(state.selected_server, "time.apple.com");
        assert!(!state.auto_sync_enabled);
        assert_eq!(state.interval_minutes, 45);
        assert!(state.last_sample.is_none());
    }

    #[test]
    fn test_add_server_keeps_order_and_dedupes() {
        let mut state = SyncState::default();
        state.add_server("ntp.example.org");
        state.add_server("pool.ntp.org"); // already present
        assert_eq!(state.available_servers.len(), 6);
        assert_eq!(state.available_servers[1], "pool.ntp.org");
        assert_eq!(state.available_servers[5], "ntp.example.org");
    }
}

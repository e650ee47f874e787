use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Result of a single network time exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSample {
    /// Network-reported time at the moment the exchange completed (Unix epoch ms).
    pub network_epoch_millis: i64,
    /// Correction to apply to the local clock (positive = local is behind).
    pub offset_millis: i64,
    /// Total request/response latency of the exchange.
    pub round_trip_millis: i64,
    /// Hostname that answered the query.
    pub server: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait TimeSource: Send + Sync {
    /// Performs one query/response time exchange against `server`.
    /// Fails on timeout or network error. No retries here; retry policy
    /// belongs to the sync scheduler.
    fn request_time(&self, server: &str) -> Result<SyncSample>;
}

#[cfg_attr(test, mockall::automock)]
pub trait TonePlayer: Send {
    /// Emit one low preparation tone.
    fn play_low(&mut self);
    /// Emit one high start tone.
    fn play_high(&mut self);
    /// Release the underlying tone generator resource. Called once the
    /// sequence finishes, is skipped, or is cancelled.
    fn release(&mut self);
}

use anyhow::Result;
use rsntp::SntpClient;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::traits::{SyncSample, TimeSource};

/// Default exchange timeout. One UDP round trip should be well under this.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// SNTP-backed time source.
pub struct NtpClient {
    timeout: Duration,
}

impl NtpClient {
    pub fn new() -> Self {
        NtpClient {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        NtpClient { timeout }
    }
}

impl Default for NtpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for NtpClient {
    /// Fetches the current time from the NTP server.
    /// The returned offset is the correction to apply to the local system
    /// time (Local + Offset = True Time). Positive offset means the local
    /// clock is behind.
    fn request_time(&self, server: &str) -> Result<SyncSample> {
        let mut client = SntpClient::new();
        client.set_timeout(self.timeout);
        let result = client.synchronize(server)?;

        let offset_millis = (result.clock_offset().as_secs_f64() * 1000.0).round() as i64;
        let round_trip_millis = (result.round_trip_delay().as_secs_f64() * 1000.0).round() as i64;

        let local_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        Ok(SyncSample {
            network_epoch_millis: local_millis + offset_millis,
            offset_millis,
            round_trip_millis,
            server: server.to_string(),
        })
    }
}

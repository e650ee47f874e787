//! Synchronized clock model.
//!
//! Holds the last successful sync snapshot and projects current time from
//! it using the monotonic local clock: the projected time is
//! `network_epoch_millis + (now_monotonic - captured_at)`. The snapshot is
//! replaced wholesale under a write lock on each sync; it is never mutated
//! field by field, so readers always observe a consistent pairing of
//! capture instant and network time.

use std::sync::RwLock;
use std::time::Instant;

use crate::traits::SyncSample;

/// Immutable record of one successful sync.
#[derive(Debug, Clone)]
pub struct ClockSnapshot {
    /// Monotonic instant at which the exchange completed.
    pub captured_at: Instant,
    /// Network-reported Unix time at `captured_at`, in milliseconds.
    pub network_epoch_millis: i64,
    /// Local-clock correction measured by the exchange.
    pub offset_millis: i64,
    /// Exchange round-trip latency.
    pub round_trip_millis: i64,
    /// Server that answered.
    pub server: String,
}

impl ClockSnapshot {
    /// Projected network time at monotonic instant `now`.
    pub fn time_at(&self, now: Instant) -> i64 {
        let elapsed = now.saturating_duration_since(self.captured_at);
        self.network_epoch_millis + elapsed.as_millis() as i64
    }
}

/// Process-wide synchronized clock. Uninitialized until the first
/// successful sync; never touches the network.
pub struct ClockModel {
    snapshot: RwLock<Option<ClockSnapshot>>,
}

impl ClockModel {
    pub fn new() -> Self {
        ClockModel {
            snapshot: RwLock::new(None),
        }
    }

    /// Atomically replaces the snapshot with one built from `sample`.
    /// `captured_at` is the monotonic instant the exchange completed.
    pub fn apply(&self, sample: &SyncSample, captured_at: Instant) {
        let next = ClockSnapshot {
            captured_at,
            network_epoch_millis: sample.network_epoch_millis,
            offset_millis: sample.offset_millis,
            round_trip_millis: sample.round_trip_millis,
            server: sample.server.clone(),
        };
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = Some(next);
    }

    /// Clone of the current snapshot, `None` before the first sync.
    pub fn snapshot(&self) -> Option<ClockSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Projected network time right now, `None` before the first sync.
    pub fn current_time_millis(&self) -> Option<i64> {
        self.time_at(Instant::now())
    }

    /// Projected network time at monotonic instant `now`.
    pub fn time_at(&self, now: Instant) -> Option<i64> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.time_at(now))
    }

    pub fn is_synchronized(&self) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Default for ClockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn sample(epoch: i64, offset: i64, server: &str) -> SyncSample {
        SyncSample {
            network_epoch_millis: epoch,
            offset_millis: offset,
            round_trip_millis: 40,
            server: server.to_string(),
        }
    }

    #[test]
    fn test_uninitialized_reports_none() {
        let clock = ClockModel::new();
        assert!(clock.current_time_millis().is_none());
        assert!(clock.snapshot().is_none());
        assert!(!clock.is_synchronized());
    }

    #[test]
    fn test_projection_adds_elapsed_monotonic_time() {
        let clock = ClockModel::new();
        let t0 = Instant::now();
        clock.apply(&sample(1_700_000_000_000, 25, "time.google.com"), t0);

        assert_eq!(clock.time_at(t0), Some(1_700_000_000_000));
        assert_eq!(
            clock.time_at(t0 + Duration::from_millis(1500)),
            Some(1_700_000_001_500)
        );
    }

    #[test]
    fn test_projection_monotonic_between_syncs() {
        let clock = ClockModel::new();
        let t0 = Instant::now();
        clock.apply(&sample(1_700_000_000_000, -3, "pool.ntp.org"), t0);

        let mut prev = clock.time_at(t0).unwrap();
        for i in 1..=200u64 {
            let t = clock.time_at(t0 + Duration::from_millis(i * 7)).unwrap();
            assert!(t >= prev, "projection went backward: {} -> {}", prev, t);
            prev = t;
        }
    }

    #[test]
    fn test_time_before_capture_saturates() {
        let clock = ClockModel::new();
        let t0 = Instant::now() + Duration::from_secs(1);
        clock.apply(&sample(1_700_000_000_000, 0, "pool.ntp.org"), t0);
        // An instant before the capture projects the capture-time value.
        assert_eq!(clock.time_at(Instant::now()), Some(1_700_000_000_000));
    }

    #[test]
    fn test_apply_replaces_snapshot_wholesale() {
        let clock = ClockModel::new();
        let t0 = Instant::now();
        clock.apply(&sample(1_000, 10, "a"), t0);
        clock.apply(&sample(2_000, -5, "b"), t0);

        let snap = clock.snapshot().unwrap();
        assert_eq!(snap.network_epoch_millis, 2_000);
        assert_eq!(snap.offset_millis, -5);
        assert_eq!(snap.server, "b");
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_snapshot() {
        // Writer publishes snapshots whose fields are arithmetically linked;
        // a torn read would break the link.
        let clock = Arc::new(ClockModel::new());
        let reader_clock = clock.clone();

        let reader = std::thread::spawn(move || {
            for _ in 0..2_000 {
                if let Some(snap) = reader_clock.snapshot() {
                    assert_eq!(
                        snap.network_epoch_millis,
                        snap.offset_millis * 1_000,
                        "torn snapshot observed"
                    );
                }
            }
        });

        let t0 = Instant::now();
        for i in 1..=2_000i64 {
            clock.apply(&sample(i * 1_000, i, "w"), t0);
        }
        reader.join().unwrap();
    }
}

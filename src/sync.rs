//! Sync service and periodic scheduler.
//!
//! `SyncService` drives the `Idle -> Syncing -> (Idle | Idle-with-error)`
//! state machine around one `TimeSource`. Exchanges are serialized: the
//! exchange mutex is held for the whole network round trip, and a caller
//! that blocked on it while another exchange ran adopts that exchange's
//! result instead of issuing a duplicate query. A failed exchange degrades
//! to `last_error` on the shared state; the next periodic tick is the retry.
//!
//! `SyncScheduler` owns the periodic task. Preference changes (interval,
//! auto-sync) cancel the running timer and start a fresh one, never adjust
//! it in place.

use anyhow::{anyhow, Result};
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::clock::ClockModel;
use crate::config;
use crate::state::SyncState;
use crate::timer::{self, TaskHandle};
use crate::traits::{SyncSample, TimeSource};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Result slot shared between the active exchanger and any waiters.
#[derive(Default)]
struct ExchangeSlot {
    last: Option<Result<SyncSample, String>>,
}

pub struct SyncService<S: TimeSource> {
    source: S,
    clock: Arc<ClockModel>,
    state: RwLock<SyncState>,
    /// Held for the duration of one network exchange.
    exchange: Mutex<ExchangeSlot>,
    /// Bumped once per completed exchange, before the mutex is released.
    generation: AtomicU64,
}

impl<S: TimeSource> SyncService<S> {
    pub fn new(source: S, clock: Arc<ClockModel>, state: SyncState) -> Self {
        SyncService {
            source,
            clock,
            state: RwLock::new(state),
            exchange: Mutex::new(ExchangeSlot::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &ClockModel {
        &self.clock
    }

    /// Clone of the current sync state.
    pub fn state(&self) -> SyncState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Performs (or joins) one sync exchange.
    ///
    /// If another caller is mid-exchange when this is called, this blocks
    /// until that exchange completes and returns its result; exactly one
    /// network query is issued for the pair.
    pub fn sync_now(&self) -> Result<SyncSample> {
        let start_gen = self.generation.load(Ordering::Acquire);
        let mut slot = self.exchange.lock().unwrap_or_else(|e| e.into_inner());

        if self.generation.load(Ordering::Acquire) != start_gen {
            // An exchange completed while we waited for the lock.
            return match &slot.last {
                Some(Ok(sample)) => Ok(sample.clone()),
                Some(Err(msg)) => Err(anyhow!(msg.clone())),
                None => Err(anyhow!("sync result missing")),
            };
        }

        let server = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.is_syncing = true;
            state.selected_server.clone()
        };

        info!("[Sync] Requesting time from {}", server);
        let outcome = self.source.request_time(&server);
        let captured_at = Instant::now();

        match &outcome {
            Ok(sample) => {
                self.clock.apply(sample, captured_at);
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.last_sample = Some(sample.clone());
                state.last_error = None;
                state.is_syncing = false;
                state.next_sync_at_millis = if state.auto_sync_enabled {
                    Some(sample.network_epoch_millis + state.interval_minutes as i64 * MILLIS_PER_MINUTE)
                } else {
                    None
                };
                info!(
                    "[Sync] Offset: {:+} ms | RTT: {} ms | Server: {}",
                    sample.offset_millis, sample.round_trip_millis, sample.server
                );
            }
            Err(e) => {
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.last_error = Some(e.to_string());
                state.is_syncing = false;
                warn!("[Sync] Exchange with {} failed: {}", server, e);
            }
        }

        slot.last = Some(outcome.as_ref().map(Clone::clone).map_err(|e| e.to_string()));
        self.generation.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Sets the sync interval, clamped to the allowed range.
    pub fn set_interval_minutes(&self, minutes: u32) {
        let clamped = config::clamp_interval(minutes);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.interval_minutes = clamped;
        drop(state);
        self.recompute_next_sync();
    }

    pub fn set_auto_sync(&self, enabled: bool) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.auto_sync_enabled = enabled;
        }
        self.recompute_next_sync();
    }

    /// Selects `server` for subsequent exchanges, adding it to the ordered
    /// server list if new.
    pub fn set_server(&self, server: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.add_server(server);
        state.selected_server = server.to_string();
    }

    /// Recomputes `next_sync_at_millis` from the projected clock. `None`
    /// when auto-sync is off or the clock has never synced.
    pub fn recompute_next_sync(&self) {
        let now = self.clock.current_time_millis();
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.next_sync_at_millis = if state.auto_sync_enabled {
            now.map(|n| n + state.interval_minutes as i64 * MILLIS_PER_MINUTE)
        } else {
            None
        };
    }
}

/// Owns the periodic sync task for one `SyncService`.
pub struct SyncScheduler<S: TimeSource + 'static> {
    service: Arc<SyncService<S>>,
    task: Option<TaskHandle>,
    /// Period of the running timer, kept so a manual sync can restart it.
    period: Option<Duration>,
}

impl<S: TimeSource + 'static> SyncScheduler<S> {
    pub fn new(service: Arc<SyncService<S>>) -> Self {
        SyncScheduler {
            service,
            task: None,
            period: None,
        }
    }

    pub fn set_interval_minutes(&mut self, minutes: u32) {
        self.service.set_interval_minutes(minutes);
        self.reschedule();
    }

    pub fn set_auto_sync(&mut self, enabled: bool) {
        self.service.set_auto_sync(enabled);
        self.reschedule();
    }

    /// Performs a manual sync through the scheduler. On success the running
    /// timer restarts, so the next scheduled exchange lands one full
    /// interval after this one, matching `next_sync_at_millis`.
    pub fn sync_now(&mut self) -> Result<SyncSample> {
        let result = self.service.sync_now();
        if result.is_ok() {
            if let Some(period) = self.period {
                self.start_timer(period);
            }
        }
        result
    }

    /// Cancels any running timer and, if auto-sync is enabled, starts a
    /// fresh periodic task at the current interval.
    pub fn reschedule(&mut self) {
        let state = self.service.state();
        if !state.auto_sync_enabled {
            self.stop();
            info!("[Scheduler] Auto-sync disabled");
            return;
        }

        info!(
            "[Scheduler] Next sync every {} min via {}",
            state.interval_minutes, state.selected_server
        );
        self.start_timer(Duration::from_secs(state.interval_minutes as u64 * 60));
    }

    fn start_timer(&mut self, period: Duration) {
        // Old timer must be dead before the new one starts.
        self.task = None;
        self.period = Some(period);
        self.service.recompute_next_sync();

        let service = self.service.clone();
        self.task = Some(timer::spawn_periodic(period, move || {
            // A failure is already recorded on the state; the next tick retries.
            let _ = service.sync_now();
        }));
    }

    pub fn stop(&mut self) {
        self.task = None;
        self.period = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

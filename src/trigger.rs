//! Overlay event trigger engine.
//!
//! Tracks zero or one pending target time and derives the overlay display
//! state from it on every tick. Within PROGRESS_WINDOW of the target a
//! countdown progress fraction is shown; at the target the event triggers
//! and pulses for PULSE_DURATION, then clears itself. The trigger timestamp
//! is always the target time itself, never wall-clock-now, so polling
//! granularity cannot skew the pulse window.

use log::{debug, info};
use std::sync::Mutex;
use std::time::Duration;

/// Span before the target during which countdown progress is shown.
pub const PROGRESS_WINDOW_MS: i64 = 5_000;
/// How long the pulsing highlight persists after the trigger.
pub const PULSE_DURATION_MS: i64 = 10_000;

/// Tick period while the overlay is on screen.
pub const VISIBLE_TICK: Duration = Duration::from_millis(16);
/// Tick period while the overlay is hidden.
pub const HIDDEN_TICK: Duration = Duration::from_millis(200);

pub fn tick_period(overlay_visible: bool) -> Duration {
    if overlay_visible {
        VISIBLE_TICK
    } else {
        HIDDEN_TICK
    }
}

/// The single scheduled target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetEvent {
    pub target_epoch_millis: i64,
    /// Set once the target time is reached; always equals the target time.
    pub triggered_at_millis: Option<i64>,
}

/// Derived per-tick display state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayDisplayState {
    /// Whether countdown progress or pulsing is currently shown.
    pub visible: bool,
    pub current_time_millis: i64,
    /// \[0, 1\] countdown fraction; 0 outside the progress window.
    pub progress_fraction: f64,
    pub is_pulsing: bool,
}

impl OverlayDisplayState {
    fn idle(now_millis: i64) -> Self {
        OverlayDisplayState {
            visible: false,
            current_time_millis: now_millis,
            progress_fraction: 0.0,
            is_pulsing: false,
        }
    }
}

pub struct TriggerEngine {
    slot: Mutex<Option<TargetEvent>>,
}

impl TriggerEngine {
    pub fn new() -> Self {
        TriggerEngine {
            slot: Mutex::new(None),
        }
    }

    /// Schedules a target, replacing any pending one. A target at or before
    /// `now_millis` is accepted and marked triggered immediately, with no
    /// progress phase.
    pub fn schedule(&self, target_epoch_millis: i64, now_millis: i64) {
        let triggered = if target_epoch_millis <= now_millis {
            info!(
                "[Trigger] Target {} already passed, triggering immediately",
                target_epoch_millis
            );
            Some(target_epoch_millis)
        } else {
            debug!(
                "[Trigger] Target scheduled {} ms ahead",
                target_epoch_millis - now_millis
            );
            None
        };

        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(TargetEvent {
            target_epoch_millis,
            triggered_at_millis: triggered,
        });
    }

    /// Drops the pending target, if any.
    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    pub fn pending(&self) -> Option<TargetEvent> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One tick of the overlay state machine at projected time `now_millis`.
    /// Single resolution pass: trigger detection, pulse expiry, and progress
    /// derivation happen in order on the same locked slot.
    pub fn tick(&self, now_millis: i64) -> OverlayDisplayState {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());

        let event = match slot.as_mut() {
            Some(event) => event,
            None => return OverlayDisplayState::idle(now_millis),
        };

        if event.triggered_at_millis.is_none() && now_millis >= event.target_epoch_millis {
            // Record the target time, not now: polling granularity must not
            // stretch the pulse window.
            event.triggered_at_millis = Some(event.target_epoch_millis);
            info!("[Trigger] Target reached");
        }

        if let Some(triggered_at) = event.triggered_at_millis {
            if now_millis - triggered_at >= PULSE_DURATION_MS {
                debug!("[Trigger] Pulse finished, clearing target");
                *slot = None;
                return OverlayDisplayState::idle(now_millis);
            }
            return OverlayDisplayState {
                visible: true,
                current_time_millis: now_millis,
                progress_fraction: 1.0,
                is_pulsing: true,
            };
        }

        let remaining = event.target_epoch_millis - now_millis;
        if remaining > PROGRESS_WINDOW_MS {
            return OverlayDisplayState::idle(now_millis);
        }

        let fraction = 1.0 - remaining as f64 / PROGRESS_WINDOW_MS as f64;
        OverlayDisplayState {
            visible: true,
            current_time_millis: now_millis,
            progress_fraction: fraction.clamp(0.0, 1.0),
            is_pulsing: false,
        }
    }
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

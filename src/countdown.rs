//! Sound countdown sequencer.
//!
//! Builds a tone schedule relative to a target time: one low tone per
//! second of preparation, then high tones every 200ms for a fixed 3-second
//! window starting at the target. The schedule is a pure list of
//! offset/tone pairs; `CountdownSequencer` plays it on a background thread
//! through a `TonePlayer`, honouring a cancel token between tones so
//! cancellation stops emission immediately and releases the player.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::timer::{self, TaskHandle};
use crate::traits::TonePlayer;

/// Interval between high start tones.
const HIGH_TONE_INTERVAL_MS: i64 = 200;
/// Length of the high-tone window starting at the target.
const START_WINDOW_MS: i64 = 3_000;

/// Count mode selected in preferences. The displayed count (3/5/10) maps
/// to a shorter preparation span so the final tone lands on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountMode {
    Three,
    Five,
    Ten,
}

impl CountMode {
    pub fn prep_seconds(self) -> i64 {
        match self {
            CountMode::Three => 2,
            CountMode::Five => 4,
            CountMode::Ten => 9,
        }
    }

    pub fn prep_millis(self) -> i64 {
        self.prep_seconds() * 1_000
    }
}

impl Default for CountMode {
    fn default() -> Self {
        CountMode::Three
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Low,
    High,
}

/// Tone schedule as offsets (ms from sequence start) paired with tones.
/// Returns `None` when the lead time is shorter than the preparation span;
/// a partial countdown is never played.
pub fn build_schedule(millis_until_target: i64, mode: CountMode) -> Option<Vec<(i64, Tone)>> {
    let prep_ms = mode.prep_millis();
    if millis_until_target < prep_ms {
        return None;
    }

    let lead = millis_until_target - prep_ms;
    let mut steps = Vec::new();

    for i in 0..mode.prep_seconds() {
        steps.push((lead + i * 1_000, Tone::Low));
    }
    for i in 0..(START_WINDOW_MS / HIGH_TONE_INTERVAL_MS) {
        steps.push((millis_until_target + i * HIGH_TONE_INTERVAL_MS, Tone::High));
    }
    Some(steps)
}

/// Plays at most one countdown at a time. Starting a new sequence cancels
/// the previous one first.
pub struct CountdownSequencer {
    task: Option<TaskHandle>,
}

impl CountdownSequencer {
    pub fn new() -> Self {
        CountdownSequencer { task: None }
    }

    /// Starts the countdown for a target `millis_until_target` ahead.
    /// Returns `false` (releasing `player` immediately) when the lead time
    /// is too short for the selected mode.
    pub fn start<P: TonePlayer + 'static>(
        &mut self,
        millis_until_target: i64,
        mode: CountMode,
        mut player: P,
    ) -> bool {
        self.cancel();

        let steps = match build_schedule(millis_until_target, mode) {
            Some(steps) => steps,
            None => {
                info!(
                    "[Countdown] {} ms lead is under the {} ms preparation span, skipping",
                    millis_until_target,
                    mode.prep_millis()
                );
                player.release();
                return false;
            }
        };

        debug!("[Countdown] Sequence of {} tones armed", steps.len());
        self.task = Some(timer::spawn_cancellable(move |token| {
            let started = Instant::now();
            for (offset, tone) in steps {
                let elapsed = started.elapsed().as_millis() as i64;
                let wait = offset - elapsed;
                if wait > 0 && !token.sleep(Duration::from_millis(wait as u64)) {
                    break;
                }
                if token.is_cancelled() {
                    break;
                }
                match tone {
                    Tone::Low => player.play_low(),
                    Tone::High => player.play_high(),
                }
            }
            player.release();
        }));
        true
    }

    /// Stops tone emission immediately and waits for the player to be
    /// released. No-op when nothing is running.
    pub fn cancel(&mut self) {
        self.task = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }
}

impl Default for CountdownSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counting player backed by shared atomics so the test thread can
    /// observe what the sequencer thread played.
    struct CountingPlayer {
        lows: Arc<AtomicUsize>,
        highs: Arc<AtomicUsize>,
        released: Arc<AtomicBool>,
    }

    impl TonePlayer for CountingPlayer {
        fn play_low(&mut self) {
            self.lows.fetch_add(1, Ordering::SeqCst);
        }
        fn play_high(&mut self) {
            self.highs.fetch_add(1, Ordering::SeqCst);
        }
        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn counting_player() -> (
        CountingPlayer,
        Arc<AtomicUsize>,
        Arc<AtomicUsize>,
        Arc<AtomicBool>,
    ) {
        let lows = Arc::new(AtomicUsize::new(0));
        let highs = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicBool::new(false));
        (
            CountingPlayer {
                lows: lows.clone(),
                highs: highs.clone(),
                released: released.clone(),
            },
            lows,
            highs,
            released,
        )
    }

    #[test]
    fn test_prep_spans() {
        assert_eq!(CountMode::Three.prep_seconds(), 2);
        assert_eq!(CountMode::Five.prep_seconds(), 4);
        assert_eq!(CountMode::Ten.prep_seconds(), 9);
    }

    #[test]
    fn test_schedule_layout() {
        let steps = build_schedule(10_000, CountMode::Three).unwrap();

        // 2 low tones at one-second spacing, ending one second before target.
        assert_eq!(steps[0], (8_000, Tone::Low));
        assert_eq!(steps[1], (9_000, Tone::Low));

        // 15 high tones, every 200ms across the 3s start window.
        let highs: Vec<_> = steps.iter().filter(|(_, t)| *t == Tone::High).collect();
        assert_eq!(highs.len(), 15);
        assert_eq!(*highs[0], (10_000, Tone::High));
        assert_eq!(*highs[14], (12_800, Tone::High));

        assert_eq!(steps.len(), 17);
    }

    #[test]
    fn test_schedule_exact_lead_time_is_allowed() {
        // Lead exactly equal to the preparation span: first low tone fires now.
        let steps = build_schedule(4_000, CountMode::Five).unwrap();
        assert_eq!(steps[0], (0, Tone::Low));
        assert_eq!(steps.iter().filter(|(_, t)| *t == Tone::Low).count(), 4);
    }

    #[test]
    fn test_insufficient_lead_skips_entirely() {
        // 1000ms lead < 4000ms preparation: no partial countdown. The
        // strict mock rejects any tone emission; only release is expected.
        assert!(build_schedule(1_000, CountMode::Five).is_none());

        let mut player = crate::traits::MockTonePlayer::new();
        player.expect_release().times(1).returning(|| ());

        let mut sequencer = CountdownSequencer::new();
        assert!(!sequencer.start(1_000, CountMode::Five, player));
        assert!(!sequencer.is_running());
    }

    #[test]
    fn test_sequence_plays_low_tones_then_cancel_releases() {
        let mut sequencer = CountdownSequencer::new();
        let (player, lows, highs, released) = counting_player();

        // Target 2100ms out, mode Three: lows at 100ms and 1100ms.
        assert!(sequencer.start(2_100, CountMode::Three, player));
        std::thread::sleep(Duration::from_millis(500));
        sequencer.cancel();

        assert!(lows.load(Ordering::SeqCst) >= 1);
        assert_eq!(highs.load(Ordering::SeqCst), 0, "high tones before target");
        assert!(released.load(Ordering::SeqCst), "player not released on cancel");
    }

    #[test]
    fn test_cancel_without_start_is_noop() {
        let mut sequencer = CountdownSequencer::new();
        sequencer.cancel();
        assert!(!sequencer.is_running());
    }

    #[test]
    fn test_restart_cancels_previous_sequence() {
        let mut sequencer = CountdownSequencer::new();
        let (first, _, _, first_released) = counting_player();
        let (second, _, _, _) = counting_player();

        assert!(sequencer.start(60_000, CountMode::Ten, first));
        assert!(sequencer.start(60_000, CountMode::Ten, second));
        assert!(
            first_released.load(Ordering::SeqCst),
            "previous sequence still holds its player"
        );
        sequencer.cancel();
    }
}

use anyhow::Result;
use chrono::{Local, TimeZone};
use clap::Parser;
use log::{info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use floatsync::clock::ClockModel;
use floatsync::config::OverlayConfig;
use floatsync::countdown::CountdownSequencer;
use floatsync::event;
use floatsync::ntp::NtpClient;
use floatsync::state::SyncState;
use floatsync::sync::{SyncScheduler, SyncService};
use floatsync::traits::TonePlayer;
use floatsync::trigger::{self, TriggerEngine};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "floatsync.json")]
    config: PathBuf,

    /// Time server to use (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Sync interval in minutes, 1-180 (overrides config)
    #[arg(short, long)]
    interval: Option<u32>,

    /// Disable periodic auto-sync
    #[arg(long)]
    no_auto_sync: bool,

    /// Schedule a target event today at HH:mm:ss.SSS
    #[arg(short, long)]
    event: Option<String>,

    /// Sync once, print the result and exit
    #[arg(long)]
    once: bool,
}

/// Console tone output: terminal bell plus a log line.
struct TerminalTonePlayer;

impl TonePlayer for TerminalTonePlayer {
    fn play_low(&mut self) {
        print!("\x07");
        let _ = std::io::stdout().flush();
        info!("[Countdown] low tone");
    }

    fn play_high(&mut self) {
        print!("\x07");
        let _ = std::io::stdout().flush();
        info!("[Countdown] high tone");
    }

    fn release(&mut self) {
        info!("[Countdown] tone player released");
    }
}

fn wall_now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn format_clock(millis: i64, show_millis: bool) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) if show_millis => dt.format("%H:%M:%S%.3f").to_string(),
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let mut config = OverlayConfig::load(&args.config);
    if let Some(server) = &args.server {
        config.selected_server = server.clone();
    }
    if let Some(interval) = args.interval {
        config.interval_minutes = interval;
    }
    if args.no_auto_sync {
        config.auto_sync = false;
    }
    let config = config.normalized();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    let clock = Arc::new(ClockModel::new());
    let service = Arc::new(SyncService::new(
        NtpClient::new(),
        clock.clone(),
        SyncState::from_config(&config),
    ));

    if args.once {
        if let Err(e) = service.sync_now() {
            warn!("Sync failed: {}", e);
        }
        let state = service.state();
        match &state.last_sample {
            Some(sample) => println!(
                "{} | offset {:+} ms | rtt {} ms | {}",
                format_clock(
                    clock.current_time_millis().unwrap_or_else(wall_now_millis),
                    true
                ),
                sample.offset_millis,
                sample.round_trip_millis,
                sample.server
            ),
            None => println!(
                "unsynchronized: {}",
                state.last_error.as_deref().unwrap_or("no result")
            ),
        }
        return Ok(());
    }

    let mut scheduler = SyncScheduler::new(service.clone());
    scheduler.reschedule();

    // Initial sync through the scheduler so the periodic timer phase
    // stays aligned with it. A failure is recorded on the state; the
    // scheduler's next tick is the retry.
    if let Err(e) = scheduler.sync_now() {
        warn!("Initial sync failed: {}", e);
    }

    let engine = TriggerEngine::new();
    let mut sequencer = CountdownSequencer::new();

    if let Some(time) = &args.event {
        let now = clock.current_time_millis().unwrap_or_else(wall_now_millis);
        match event::target_today(time, Local::now()) {
            Some(target) => {
                engine.schedule(target, now);
                sequencer.start(target - now, config.display.count_mode, TerminalTonePlayer);
                info!("Event scheduled for {} today", time);
            }
            None => warn!("Ignoring malformed event time '{}'", time),
        }
    }

    let mut last_status = Instant::now();
    let mut was_pulsing = false;
    let mut was_visible = false;

    while running.load(Ordering::SeqCst) {
        let now = clock.current_time_millis().unwrap_or_else(wall_now_millis);
        let display = engine.tick(now);

        if display.visible && !was_visible {
            info!("[Overlay] Countdown progress started");
        }
        if display.is_pulsing && !was_pulsing {
            info!("[Overlay] Pulsing");
        }
        if was_pulsing && !display.is_pulsing {
            info!("[Overlay] Event cleared");
        }
        was_visible = display.visible;
        was_pulsing = display.is_pulsing;

        if last_status.elapsed() >= Duration::from_secs(10) {
            let state = service.state();
            match &state.last_sample {
                Some(sample) => info!(
                    "[Status] {} | Offset: {:+} ms | RTT: {} ms | Server: {} | Next sync: {}",
                    format_clock(now, config.display.show_millis),
                    sample.offset_millis,
                    sample.round_trip_millis,
                    sample.server,
                    state
                        .next_sync_at_millis
                        .map(|t| format_clock(t, false))
                        .unwrap_or_else(|| "-".to_string())
                ),
                None => info!(
                    "[Status] {} (unsynchronized) | Last error: {}",
                    format_clock(now, config.display.show_millis),
                    state.last_error.as_deref().unwrap_or("none")
                ),
            }
            last_status = Instant::now();
        }

        thread::sleep(trigger::tick_period(display.visible));
    }

    sequencer.cancel();
    scheduler.stop();
    info!("Exiting.");
    Ok(())
}

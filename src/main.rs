//! # Tank Controls Bench
//!
//! Runs the full control loop against simulated hardware.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration and set up logging
//!    - Open the file-backed configuration sector
//!    - Optionally persist the configured control settings (`--save-controls`)
//!
//! 2. **Main Loop**
//!    - Input task samples the simulated controls every 25 ms
//!    - Keyboard task emits duty-cycled reports every 5 ms
//!    - A scripted driver moves the pedals and tillers, and runs a calibration
//!      sweep first if none is stored
//!
//! 3. **Shutdown**
//!    - Ctrl+C stops every task
//!    - An integrity fault stops every task and waits for Ctrl+C
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO tank_controls: Tank Controls v0.1.0 starting...
//! INFO tank_controls::storage: Loaded configuration record
//! INFO tank_controls::tasks::input_task: Input task running every 25ms
//! INFO tank_controls: Sent 1000 reports, last [0, 0, 26, 4, 0, 0, 0, 0]
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tank_controls::bench::{FileFlash, RecordingHid, SimForceBus, SimPedals, SimSwitch, SpinDelay};
use tank_controls::config::{Config, LoggingConfig};
use tank_controls::controls::conditioner::ModeSwitch;
use tank_controls::controls::types::{PEDAL_RAW_MAX, PEDAL_RAW_MIN};
use tank_controls::fault::halt_channel;
use tank_controls::hal::{PedalChannel, SchedulerSuspend};
use tank_controls::keyboard::{intent_mailbox, KillSwitch};
use tank_controls::sensor::hx710c::{Hx710c, CONVERSION_RATE_HZ};
use tank_controls::sensor::Acquisition;
use tank_controls::storage::{CalibrationStore, WriteOutcome};
use tank_controls::tasks::{InputTask, KeyboardTask};

/// Reports between status log messages
const LOG_INTERVAL_REPORTS: u64 = 1000;

/// How long the scripted driver holds the calibration switch on
const CALIBRATION_SWEEP: Duration = Duration::from_secs(8);

/// Peak tiller load cell reading of the scripted driver
const TILLER_PEAK: f64 = 600_000.0;

/// Command-line arguments
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config_path: Option<String>,
    save_controls: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Args {
    let mut parsed = Args::default();
    for arg in args {
        if arg == "--save-controls" {
            parsed.save_controls = true;
        } else if parsed.config_path.is_none() && !arg.starts_with("--") {
            parsed.config_path = Some(arg);
        }
    }
    parsed
}

fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, guard) = if config.directory.is_empty() {
        tracing_appender::non_blocking(std::io::stdout())
    } else {
        tracing_appender::non_blocking(tracing_appender::rolling::daily(
            &config.directory,
            "tank-controls.log",
        ))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();

    guard
}

/// Moves the simulated controls like a driver would.
///
/// With `calibrate`, holds the calibration switch on for a full sweep of every
/// control first.
async fn drive(bus: SimForceBus, pedals: SimPedals, calibration_switch: SimSwitch, calibrate: bool) {
    let start = Instant::now();
    let mut ticker = interval(Duration::from_secs(1) / CONVERSION_RATE_HZ);

    if calibrate {
        info!("No calibration stored, running a calibration sweep");
        calibration_switch.set_high(false);
    }

    loop {
        ticker.tick().await;
        let t = start.elapsed().as_secs_f64();

        if calibration_switch.is_on() && t >= CALIBRATION_SWEEP.as_secs_f64() {
            info!("Calibration sweep finished");
            calibration_switch.set_high(true);
        }

        // Pedal codes fall as the pedal is pushed
        let push = 0.5 + 0.5 * (t * 0.8).sin();
        let span = f64::from(PEDAL_RAW_MAX - PEDAL_RAW_MIN);
        pedals.set(PedalChannel::Accelerator, PEDAL_RAW_MAX - (push * span) as u16);

        let left = (t.sin().max(0.0) * TILLER_PEAK) as i32;
        let right = ((t + std::f64::consts::PI).sin().max(0.0) * TILLER_PEAK) as i32;
        bus.latch(&[left, right]);
    }
}

/// Logs emission progress every [`LOG_INTERVAL_REPORTS`] reports.
async fn report_status(hid: RecordingHid) {
    let mut ticker = interval(Duration::from_millis(500));
    let mut last_logged = 0;

    loop {
        ticker.tick().await;
        let sent = hid.sent();
        if sent - last_logged >= LOG_INTERVAL_REPORTS {
            if let Some(report) = hid.last() {
                info!("Sent {} reports, last {:?}", sent, report.to_bytes());
            }
            last_logged = sent;
        }
    }
}

/// Main entry point for the Tank Controls bench
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be loaded
/// - The configuration sector cannot be opened or initialized
#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1));
    let config = match &args.config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging);
    info!("Tank Controls v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config_path {
        info!("Loaded configuration from {}", path);
    }

    let cs = SchedulerSuspend::new();
    let flash = FileFlash::open(&config.storage.flash_path, config.storage.sector_size)?;
    let store = Arc::new(CalibrationStore::open(flash, cs.clone())?);

    if args.save_controls {
        match store.save_control_settings(&config.controls)? {
            WriteOutcome::Written => info!("Saved control settings"),
            WriteOutcome::Unchanged => info!("Control settings already stored"),
        }
    }
    let calibrate = store.calibration().is_none();

    // Simulated hardware
    let bus = SimForceBus::new(2);
    let pedals = SimPedals::new();
    let calibration_switch = SimSwitch::new(true);
    let engine_switch = SimSwitch::new(true);
    let hid = RecordingHid::new();

    let sensor = Hx710c::new(bus.clock_pin(), [bus.data_pin(0), bus.data_pin(1)], SpinDelay, &cs)?;
    let acquisition = Acquisition::new(sensor, pedals.adc(), cs);
    let mode = ModeSwitch::new(calibration_switch.clone(), config.switch_debounce());
    let kill_switch = KillSwitch::new(engine_switch, config.keyboard.kill_switch_release_reads);

    let (publisher, receiver) = intent_mailbox();
    let (halt, mut monitor) = halt_channel();

    let input = InputTask::new(
        acquisition,
        mode,
        store,
        publisher,
        halt.clone(),
        config.input_options(),
    );
    let keyboard = KeyboardTask::new(
        hid.clone(),
        kill_switch,
        receiver,
        halt,
        config.keyboard_options(),
    );

    let tasks: Vec<JoinHandle<()>> = vec![
        tokio::spawn(drive(bus, pedals, calibration_switch, calibrate)),
        tokio::spawn(input.run()),
        tokio::spawn(keyboard.run()),
        tokio::spawn(report_status(hid.clone())),
    ];

    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        fault = monitor.halted() => {
            tasks.iter().for_each(JoinHandle::abort);
            error!("System halted: {}", fault);
            info!("All scheduled work stopped. Power cycle (Ctrl+C) to exit.");
            tokio::signal::ctrl_c().await?;
        }
    }

    tasks.iter().for_each(JoinHandle::abort);
    info!("Total reports sent: {}", hid.sent());

    Ok(())
}

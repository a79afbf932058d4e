//! # Bench Hardware
//!
//! Simulated peripherals so the control core runs on a development machine.
//!
//! This module handles:
//! - A force sensor bus that speaks the HX710C clock/data protocol
//! - Pedal potentiometers behind a multiplexed ADC
//! - Calibration and engine switches
//! - A file-backed configuration sector
//! - A keyboard endpoint that records every report

mod flash;
mod force_sensor;
mod hid;
mod pedals;
mod switch;

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

pub use flash::{FileFlash, RamFlash};
pub use force_sensor::{SimClockPin, SimDataPin, SimForceBus};
pub use hid::{RecordingHid, DEFAULT_HISTORY};
pub use pedals::{SimPedalAdc, SimPedals};
pub use switch::SimSwitch;

/// Busy-waits for the requested time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinDelay;

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let until = Instant::now() + Duration::from_nanos(u64::from(ns));
        while Instant::now() < until {
            std::hint::spin_loop();
        }
    }
}

/// Returns immediately. For simulated lines that have no timing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

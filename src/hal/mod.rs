//! # Hardware Seams
//!
//! Traits for the peripherals the control core talks to. Digital lines and
//! nanosecond delays come straight from `embedded-hal`; the pedal ADC, the HID
//! keyboard sink and the configuration flash sector are small crate-local
//! traits so that boards, the host bench and tests can plug in their own.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

/// Errors reported by peripheral implementations.
#[derive(Debug, Error)]
pub enum HalError {
    /// Backing storage failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Device-specific failure
    #[error("Device error: {0}")]
    Device(String),
}

/// Runs a closure without being preempted by other scheduled work.
///
/// The force sensor protocol and flash rewrites both need this. Implementations
/// must release the section on every exit path of `f`.
pub trait CriticalSection {
    /// Executes `f` inside the critical section.
    fn run<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// Host stand-in for suspending the RTOS scheduler.
///
/// It does not exclude anything: other runtime workers keep running while `f`
/// executes. It only counts sections so callers can check that timing-sensitive
/// work went through one.
#[derive(Debug, Clone, Default)]
pub struct SchedulerSuspend {
    entered: Arc<AtomicUsize>,
}

impl SchedulerSuspend {
    /// Creates a new handle with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of critical sections entered through this handle or its clones.
    #[must_use]
    pub fn sections_entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

impl CriticalSection for SchedulerSuspend {
    fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let section = self.entered.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Entering critical section {}", section);
        f()
    }
}

/// Analog inputs wired to the pedals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedalChannel {
    Accelerator,
    Brake,
    Clutch,
}

impl PedalChannel {
    /// ADC input number the pedal is wired to.
    #[must_use]
    pub fn adc_input(self) -> u8 {
        match self {
            Self::Accelerator => 0,
            Self::Brake => 1,
            Self::Clutch => 2,
        }
    }
}

/// 12-bit ADC used for the pedals.
#[cfg_attr(test, mockall::automock)]
pub trait PedalAdc {
    /// Routes the converter to `channel` for the next read.
    fn select_input(&mut self, channel: PedalChannel) -> Result<(), HalError>;

    /// Performs one conversion on the selected input.
    fn read(&mut self) -> Result<u16, HalError>;
}

/// Boot-protocol keyboard endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait HidKeyboard {
    /// Returns true when the endpoint can accept another report.
    fn ready(&self) -> bool;

    /// Queues one keyboard report.
    fn send_keyboard_report(
        &mut self,
        modifiers: u8,
        reserved: u8,
        keycodes: [u8; 6],
    ) -> Result<(), HalError>;
}

/// The erase block reserved for the persisted configuration record.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigFlash {
    /// Copies `buf.len()` bytes from the start of the sector.
    fn read(&self, buf: &mut [u8]) -> Result<(), HalError>;

    /// Erases the whole sector.
    fn erase(&mut self) -> Result<(), HalError>;

    /// Programs `data` at the start of the sector.
    fn program(&mut self, data: &[u8]) -> Result<(), HalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pedal_adc_inputs() {
        assert_eq!(PedalChannel::Accelerator.adc_input(), 0);
        assert_eq!(PedalChannel::Brake.adc_input(), 1);
        assert_eq!(PedalChannel::Clutch.adc_input(), 2);
    }

    #[test]
    fn test_scheduler_suspend_counts_sections() {
        let cs = SchedulerSuspend::new();
        let shared = cs.clone();

        let value = cs.run(|| 7);
        shared.run(|| ());

        assert_eq!(value, 7);
        assert_eq!(cs.sections_entered(), 2);
    }
}

//! # HX710C Force Sensor Driver
//!
//! Bit-banged driver for one or more HX710C delta-sigma ADCs that share a
//! clock line. Each chip has its own data line and all chips are read in
//! lock-step: one clock pulse shifts one bit out of every chip at once.
//!
//! ## Protocol
//!
//! A chip signals a finished conversion by pulling its data line low. The host
//! then drives 24 clock pulses and samples the data line after each rising
//! edge, most significant bit first. The number of extra pulses that follow
//! selects the next conversion's mode; three extra pulses (27 in total) select
//! the 40 Hz mode this driver always uses.
//!
//! ## Timing
//!
//! | Symbol | Meaning | Delay |
//! |--------|---------|-------|
//! | T1 | Data ready to first rising edge | 150 ns |
//! | T2 | Rising edge to data valid | 150 ns |
//! | T3 | Clock high | 300 ns |
//! | T4 | Clock low | 300 ns |
//!
//! Holding the clock high for too long powers the chip down and desynchronises
//! the transfer, so every transaction runs inside a [`CriticalSection`].
//! Checking readiness does not need one and a "not ready" read never enters it.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use thiserror::Error;

use crate::hal::CriticalSection;

/// Clock pulses that select the 40 Hz conversion mode at power-up.
pub const LOW_RATE_INIT_PULSES: u8 = 27;

/// Bits in one conversion.
pub const CONVERSION_BITS: u8 = 24;

/// Pulses after the conversion bits that re-select 40 Hz mode.
pub const LOW_RATE_TRAILING_PULSES: u8 = LOW_RATE_INIT_PULSES - CONVERSION_BITS;

/// Maximum conversion rate in 40 Hz mode.
pub const CONVERSION_RATE_HZ: u32 = 40;

const T1_NS: u32 = 150;
const T2_NS: u32 = 150;
const T3_NS: u32 = 300;
const T4_NS: u32 = 300;

/// Force sensor bus errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Hx710cError {
    /// Driving the shared clock line failed
    #[error("clock line could not be driven")]
    Clock,

    /// Reading a data line failed
    #[error("data line {0} could not be read")]
    Data(usize),
}

/// Sign-extends a 24-bit two's-complement value.
///
/// # Examples
///
/// ```
/// use tank_controls::sensor::hx710c::sign_extend_24;
///
/// assert_eq!(sign_extend_24(0x00_0001), 1);
/// assert_eq!(sign_extend_24(0xFF_FFFF), -1);
/// assert_eq!(sign_extend_24(0x80_0000), -8_388_608);
/// ```
#[must_use]
pub fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

/// `N` HX710C chips on one shared clock line.
#[derive(Debug)]
pub struct Hx710c<CLK, DATA, D, const N: usize> {
    clock: CLK,
    data: [DATA; N],
    delay: D,
}

impl<CLK, DATA, D, const N: usize> Hx710c<CLK, DATA, D, N>
where
    CLK: OutputPin,
    DATA: InputPin,
    D: DelayNs,
{
    /// Takes ownership of the lines and selects 40 Hz mode on every chip.
    ///
    /// The pins must already be configured: clock as a push-pull output and
    /// data lines as floating inputs.
    ///
    /// # Errors
    ///
    /// Returns [`Hx710cError::Clock`] if the clock line cannot be driven.
    pub fn new<C: CriticalSection>(
        clock: CLK,
        data: [DATA; N],
        delay: D,
        cs: &C,
    ) -> Result<Self, Hx710cError> {
        let mut device = Self { clock, data, delay };

        cs.run(|| {
            device.clock.set_low().map_err(|_| Hx710cError::Clock)?;
            device.delay.delay_ns(T1_NS);
            device.pulse(LOW_RATE_INIT_PULSES)
        })?;

        Ok(device)
    }

    /// Returns true once every chip has a conversion waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Hx710cError::Data`] if a data line cannot be read.
    pub fn is_ready(&mut self) -> Result<bool, Hx710cError> {
        for (index, line) in self.data.iter_mut().enumerate() {
            if line.is_high().map_err(|_| Hx710cError::Data(index))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Reads one conversion from every chip.
    ///
    /// Returns `Ok(None)` without touching the clock when any chip is still
    /// converting. Polling faster than [`CONVERSION_RATE_HZ`] simply yields
    /// more `None`s.
    ///
    /// # Errors
    ///
    /// Returns an error if a line fails mid-transaction. The chips are then in
    /// an unknown state until their next conversion.
    pub fn read<C: CriticalSection>(&mut self, cs: &C) -> Result<Option<[i32; N]>, Hx710cError> {
        if !self.is_ready()? {
            return Ok(None);
        }

        let raw = cs.run(|| self.shift_in())?;
        Ok(Some(raw.map(sign_extend_24)))
    }

    /// Clocks out one conversion per chip plus the mode-select pulses.
    fn shift_in(&mut self) -> Result<[u32; N], Hx710cError> {
        let mut raw = [0u32; N];

        self.delay.delay_ns(T1_NS);

        for bit in (0..CONVERSION_BITS).rev() {
            self.clock.set_high().map_err(|_| Hx710cError::Clock)?;
            self.delay.delay_ns(T2_NS);
            for (index, line) in self.data.iter_mut().enumerate() {
                if line.is_high().map_err(|_| Hx710cError::Data(index))? {
                    raw[index] |= 1 << bit;
                }
            }
            self.delay.delay_ns(T3_NS - T2_NS);
            self.clock.set_low().map_err(|_| Hx710cError::Clock)?;
            self.delay.delay_ns(T4_NS);
        }

        self.pulse(LOW_RATE_TRAILING_PULSES)?;
        Ok(raw)
    }

    fn pulse(&mut self, count: u8) -> Result<(), Hx710cError> {
        for _ in 0..count {
            self.clock.set_high().map_err(|_| Hx710cError::Clock)?;
            self.delay.delay_ns(T3_NS);
            self.clock.set_low().map_err(|_| Hx710cError::Clock)?;
            self.delay.delay_ns(T4_NS);
        }
        Ok(())
    }
}

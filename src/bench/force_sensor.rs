//! Simulated HX710C force sensors sharing one clock line.
//!
//! Each simulated chip pulls its data line low once a conversion is latched,
//! shifts one bit out (MSB first) on each of the next 24 rising clock edges and
//! releases the line on the 25th. A value latched while a transfer is running
//! is held back until that transfer finishes.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

const CONVERSION_BITS: u8 = 24;
const CONVERSION_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone, Copy)]
struct SimChip {
    line_high: bool,
    armed: bool,
    shifted: u8,
    value: u32,
    queued: Option<u32>,
}

impl SimChip {
    fn idle() -> Self {
        Self {
            line_high: true,
            armed: false,
            shifted: 0,
            value: 0,
            queued: None,
        }
    }

    fn arm(&mut self, value: u32) {
        self.value = value & CONVERSION_MASK;
        self.shifted = 0;
        self.armed = true;
        self.line_high = false;
    }

    fn latch(&mut self, value: u32) {
        if self.armed && self.shifted > 0 {
            self.queued = Some(value);
        } else {
            self.arm(value);
        }
    }

    fn rising_edge(&mut self) {
        if !self.armed {
            return;
        }
        if self.shifted < CONVERSION_BITS {
            let bit = CONVERSION_BITS - 1 - self.shifted;
            self.line_high = (self.value >> bit) & 1 == 1;
            self.shifted += 1;
        } else {
            self.armed = false;
            self.line_high = true;
            if let Some(next) = self.queued.take() {
                self.arm(next);
            }
        }
    }
}

#[derive(Debug)]
struct BusState {
    clock_high: bool,
    rising_edges: u32,
    chips: Vec<SimChip>,
}

/// Shared state of the simulated sensor bus.
#[derive(Debug, Clone)]
pub struct SimForceBus {
    state: Arc<Mutex<BusState>>,
}

impl SimForceBus {
    /// Creates a bus with `chips` idle sensors.
    #[must_use]
    pub fn new(chips: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                clock_high: false,
                rising_edges: 0,
                chips: vec![SimChip::idle(); chips],
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shared clock line.
    #[must_use]
    pub fn clock_pin(&self) -> SimClockPin {
        SimClockPin { bus: self.clone() }
    }

    /// Data line of chip `index`.
    #[must_use]
    pub fn data_pin(&self, index: usize) -> SimDataPin {
        SimDataPin {
            bus: self.clone(),
            index,
        }
    }

    /// Makes a conversion available on every chip, in chip order.
    pub fn latch(&self, values: &[i32]) {
        let mut state = self.lock();
        for (chip, &value) in state.chips.iter_mut().zip(values) {
            chip.latch(value as u32);
        }
    }

    /// Makes a conversion available on one chip.
    pub fn latch_channel(&self, index: usize, value: i32) {
        if let Some(chip) = self.lock().chips.get_mut(index) {
            chip.latch(value as u32);
        }
    }

    /// Rising clock edges seen since the bus was created.
    #[must_use]
    pub fn rising_edges(&self) -> u32 {
        self.lock().rising_edges
    }

    #[must_use]
    pub fn clock_is_high(&self) -> bool {
        self.lock().clock_high
    }
}

/// Clock line driven by the driver.
#[derive(Debug, Clone)]
pub struct SimClockPin {
    bus: SimForceBus,
}

impl ErrorType for SimClockPin {
    type Error = Infallible;
}

impl OutputPin for SimClockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bus.lock().clock_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.bus.lock();
        if !state.clock_high {
            state.clock_high = true;
            state.rising_edges += 1;
            state.chips.iter_mut().for_each(SimChip::rising_edge);
        }
        Ok(())
    }
}

/// Data line of one simulated chip.
#[derive(Debug, Clone)]
pub struct SimDataPin {
    bus: SimForceBus,
    index: usize,
}

impl ErrorType for SimDataPin {
    type Error = Infallible;
}

impl InputPin for SimDataPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self
            .bus
            .lock()
            .chips
            .get(self.index)
            .map_or(true, |chip| chip.line_high))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

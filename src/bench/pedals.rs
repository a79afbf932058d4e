//! Simulated pedal potentiometers behind a multiplexed ADC.

use std::sync::{Arc, Mutex, PoisonError};

use crate::controls::types::PEDAL_RAW_MAX;
use crate::hal::{HalError, PedalAdc, PedalChannel};

/// Shared pedal positions, as raw ADC codes.
#[derive(Debug, Clone)]
pub struct SimPedals {
    codes: Arc<Mutex<[u16; 3]>>,
}

impl Default for SimPedals {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPedals {
    /// All pedals released.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codes: Arc::new(Mutex::new([PEDAL_RAW_MAX; 3])),
        }
    }

    pub fn set(&self, channel: PedalChannel, code: u16) {
        let mut codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        codes[usize::from(channel.adc_input())] = code;
    }

    /// An ADC reading these pedals.
    #[must_use]
    pub fn adc(&self) -> SimPedalAdc {
        SimPedalAdc {
            codes: Arc::clone(&self.codes),
            selected: PedalChannel::Accelerator,
        }
    }
}

/// ADC view of [`SimPedals`].
#[derive(Debug)]
pub struct SimPedalAdc {
    codes: Arc<Mutex<[u16; 3]>>,
    selected: PedalChannel,
}

impl PedalAdc for SimPedalAdc {
    fn select_input(&mut self, channel: PedalChannel) -> Result<(), HalError> {
        self.selected = channel;
        Ok(())
    }

    fn read(&mut self) -> Result<u16, HalError> {
        let codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(codes[usize::from(self.selected.adc_input())])
    }
}

//! Simulated two-position switch with a pull-up.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embedded_hal::digital::{ErrorType, InputPin};

/// Switch input whose level can be changed from another handle.
///
/// Clones share the same level.
#[derive(Debug, Clone)]
pub struct SimSwitch {
    high: Arc<AtomicBool>,
}

impl SimSwitch {
    #[must_use]
    pub fn new(initial_high: bool) -> Self {
        Self {
            high: Arc::new(AtomicBool::new(initial_high)),
        }
    }

    pub fn set_high(&self, high: bool) {
        self.high.store(high, Ordering::SeqCst);
    }

    /// Active-low switches are "on" when the line is low.
    #[must_use]
    pub fn is_on(&self) -> bool {
        !self.high.load(Ordering::SeqCst)
    }
}

impl ErrorType for SimSwitch {
    type Error = Infallible;
}

impl InputPin for SimSwitch {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high.load(Ordering::SeqCst))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high.load(Ordering::SeqCst))
    }
}

//! # Engine Kill Switch
//!
//! Active-low switch that forces every key up. Turning the engine off takes
//! effect on the next read; turning it back on only counts once the switch
//! has read "released" several times in a row, so a bouncing contact can not
//! briefly re-enable output.

use embedded_hal::digital::InputPin;
use tracing::info;

/// Consecutive released reads needed before output resumes.
pub const DEFAULT_RELEASE_READS: u32 = 3;

/// Debounced engine kill switch. Starts engaged.
#[derive(Debug)]
pub struct KillSwitch<P> {
    pin: P,
    release_reads: u32,
    released_for: u32,
    engaged: bool,
}

impl<P: InputPin> KillSwitch<P> {
    /// Wraps the switch input.
    ///
    /// A `release_reads` of 0 is treated as 1.
    #[must_use]
    pub fn new(pin: P, release_reads: u32) -> Self {
        Self {
            pin,
            release_reads: release_reads.max(1),
            released_for: 0,
            engaged: true,
        }
    }

    /// Reads the switch and returns true while output must be suppressed.
    ///
    /// A pin read failure counts as the switch being asserted.
    pub fn poll(&mut self) -> bool {
        let asserted = self.pin.is_low().unwrap_or(true);

        if asserted {
            if !self.engaged {
                info!("Engine switched off, releasing all keys.");
            }
            self.engaged = true;
            self.released_for = 0;
        } else if self.engaged {
            self.released_for += 1;
            if self.released_for >= self.release_reads {
                info!("Engine switched on.");
                self.engaged = false;
            }
        }

        self.engaged
    }

    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

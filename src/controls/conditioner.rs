//! # Signal Conditioner
//!
//! Turns raw readings into normalized axis values, or, while the calibration
//! switch is on, widens the calibration bounds with every reading.
//!
//! ## Normal Mode
//!
//! Each axis is scaled linearly between its calibrated `min` and `max` and
//! clamped to [0, 1]. The accelerator is inverted because its raw code drops
//! as the pedal is pushed.
//!
//! ## Calibration Mode
//!
//! The operator sweeps every control through its travel while the switch is
//! on. No report is produced and the caller must publish a neutral intent so
//! the vehicle stays still. Leaving the mode hands the captured bounds back to
//! the caller for saving.
//!
//! ## Usage
//!
//! ```
//! use tank_controls::controls::conditioner::normalize;
//! use tank_controls::controls::types::{CalibrationBounds, RawSample};
//!
//! let bounds = CalibrationBounds::FULL_RANGE;
//! let pressed = RawSample { accelerator: 0, ..RawSample::RESTING };
//!
//! let report = normalize(&pressed, &bounds);
//! assert_eq!(report.accelerator, 1.0);
//! ```

use std::time::Duration;

use embedded_hal::digital::InputPin;
use tokio::time::Instant;
use tracing::{debug, info};

use super::types::{CalibrationBounds, Gear, NormalizedReport, RawSample};

/// Minimum time between two reads of the calibration switch.
pub const DEFAULT_SWITCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Scales `raw` from `[min, max]` into [0, 1], clamping outside values.
///
/// Collapsed bounds (`min == max`) give 0 rather than dividing by zero.
///
/// # Examples
///
/// ```
/// use tank_controls::controls::conditioner::scale_to_unit;
///
/// assert_eq!(scale_to_unit(50.0, 0.0, 100.0), 0.5);
/// assert_eq!(scale_to_unit(150.0, 0.0, 100.0), 1.0);
/// assert_eq!(scale_to_unit(7.0, 7.0, 7.0), 0.0);
/// ```
#[must_use]
pub fn scale_to_unit(raw: f64, min: f64, max: f64) -> f32 {
    if max == min {
        return 0.0;
    }

    let value = (raw - min) / (max - min);
    value.clamp(0.0, 1.0) as f32
}

/// Builds a normalized report from one sample and the calibration bounds.
#[must_use]
pub fn normalize(raw: &RawSample, bounds: &CalibrationBounds) -> NormalizedReport {
    // High raw accelerator codes mean the pedal is released
    let accelerator = if bounds.min.accelerator == bounds.max.accelerator {
        0.0
    } else {
        1.0 - scale_to_unit(
            f64::from(raw.accelerator),
            f64::from(bounds.min.accelerator),
            f64::from(bounds.max.accelerator),
        )
    };

    NormalizedReport {
        accelerator,
        left_tiller: scale_to_unit(
            f64::from(raw.left_tiller),
            f64::from(bounds.min.left_tiller),
            f64::from(bounds.max.left_tiller),
        ),
        right_tiller: scale_to_unit(
            f64::from(raw.right_tiller),
            f64::from(bounds.min.right_tiller),
            f64::from(bounds.max.right_tiller),
        ),
        // TODO: read the gear from a selector input once one is wired
        gear: Gear::Forward,
    }
}

/// Widens `bounds` by one sample and returns the result.
///
/// Min and max are commutative reducers, so the order samples arrive in does
/// not affect the final bounds.
#[must_use]
pub fn accumulate(mut bounds: CalibrationBounds, raw: &RawSample) -> CalibrationBounds {
    bounds.include(raw);
    bounds
}

/// Transition of the calibration switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEdge {
    Entered,
    Exited,
}

/// Debounced state of the calibration switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeState {
    /// Calibration mode is active.
    pub calibrating: bool,
    /// Set on the poll where the mode changed.
    pub edge: Option<ModeEdge>,
}

/// Active-low calibration mode switch with a minimum re-read interval.
#[derive(Debug)]
pub struct ModeSwitch<P> {
    pin: P,
    debounce: Duration,
    last_read: Option<Instant>,
    calibrating: bool,
}

impl<P: InputPin> ModeSwitch<P> {
    /// Wraps the switch input. The first poll always reads the pin.
    #[must_use]
    pub fn new(pin: P, debounce: Duration) -> Self {
        Self {
            pin,
            debounce,
            last_read: None,
            calibrating: false,
        }
    }

    /// Returns the mode, reading the pin only if the debounce interval passed.
    ///
    /// A pin read failure is treated as "switch off".
    pub fn poll(&mut self, now: Instant) -> ModeState {
        if let Some(last) = self.last_read {
            if now.saturating_duration_since(last) < self.debounce {
                return ModeState {
                    calibrating: self.calibrating,
                    edge: None,
                };
            }
        }
        self.last_read = Some(now);

        let calibrating = self.pin.is_low().unwrap_or(false);
        let edge = match (self.calibrating, calibrating) {
            (false, true) => {
                info!("Entering calibration mode.");
                Some(ModeEdge::Entered)
            }
            (true, false) => {
                info!("Leaving calibration mode.");
                Some(ModeEdge::Exited)
            }
            _ => None,
        };
        self.calibrating = calibrating;

        ModeState { calibrating, edge }
    }
}

/// Result of conditioning one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Conditioned {
    /// Normalized axes. `None` while calibrating.
    pub report: Option<NormalizedReport>,
    /// Bounds captured by a calibration run that just finished.
    pub finished_calibration: Option<CalibrationBounds>,
}

/// Owns the live calibration bounds and applies the current mode to samples.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    bounds: CalibrationBounds,
    reset_on_entry: bool,
}

impl SignalConditioner {
    /// Creates a conditioner starting from `bounds`.
    ///
    /// With `reset_on_entry`, entering calibration mode discards the current
    /// bounds so the capture starts from scratch.
    #[must_use]
    pub fn new(bounds: CalibrationBounds, reset_on_entry: bool) -> Self {
        Self {
            bounds,
            reset_on_entry,
        }
    }

    /// Current calibration bounds.
    #[must_use]
    pub fn bounds(&self) -> &CalibrationBounds {
        &self.bounds
    }

    /// Processes one sample under the given mode.
    pub fn process(&mut self, sample: &RawSample, mode: ModeState) -> Conditioned {
        if mode.calibrating {
            if mode.edge == Some(ModeEdge::Entered) && self.reset_on_entry {
                debug!("Reset calibration data.");
                self.bounds = CalibrationBounds::EMPTY;
            }
            self.bounds = accumulate(self.bounds, sample);
            return Conditioned::default();
        }

        Conditioned {
            report: Some(normalize(sample, &self.bounds)),
            finished_calibration: (mode.edge == Some(ModeEdge::Exited)).then_some(self.bounds),
        }
    }
}

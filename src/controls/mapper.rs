//! # Output Mapper
//!
//! Shapes normalized axis values into duty-cycle intents for the keyboard.
//!
//! ## Pedal
//!
//! Below `pedal_deadzone` the forward output is 0. Above it the remaining
//! travel `[deadzone, 1]` is stretched to `[0, 1]`.
//!
//! ## Tillers
//!
//! Each tiller drives its own side. Below `tiller_deadzone` it does nothing.
//! Turning ramps from the deadzone up to `tiller_max_turn_threshold`, where it
//! saturates. Pulling further, past `tiller_handbrake_threshold_begin`, ramps
//! in the handbrake until `tiller_handbrake_threshold_end`. Either tiller can
//! apply the full handbrake on its own.
//!
//! ## Usage
//!
//! ```
//! use tank_controls::controls::mapper::map;
//! use tank_controls::controls::types::{ControlSettings, NormalizedReport};
//!
//! let settings = ControlSettings::default();
//! let report = NormalizedReport { accelerator: 1.0, left_tiller: 0.95, ..Default::default() };
//!
//! let intent = map(&settings, &report);
//! assert_eq!(intent.forward, 1.0);
//! assert_eq!(intent.left, 1.0);
//! assert_eq!(intent.handbrake, 1.0);
//! assert_eq!(intent.right, 0.0);
//! ```

use super::types::{ControlSettings, Intent, NormalizedReport};

/// Outputs driven by one tiller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TillerOutput {
    /// Turning duty cycle for the tiller's side.
    pub side: f32,
    /// Handbrake duty cycle requested by this tiller.
    pub handbrake: f32,
}

/// Rescales `[begin, end]` to `[0, 1]`, saturating at 1.
///
/// A degenerate ramp (`end <= begin`) acts as a step at `begin`.
#[inline]
fn ramp(input: f32, begin: f32, end: f32) -> f32 {
    let span = end - begin;
    if span <= 0.0 {
        return if input >= begin { 1.0 } else { 0.0 };
    }
    ((input - begin) / span).clamp(0.0, 1.0)
}

/// Applies the pedal deadzone and rescales the remaining travel.
#[must_use]
pub fn map_pedal(settings: &ControlSettings, input: f32) -> f32 {
    if input < settings.pedal_deadzone {
        return 0.0;
    }
    ramp(input, settings.pedal_deadzone, 1.0)
}

/// Maps one tiller to its turning and handbrake outputs.
#[must_use]
pub fn map_tiller(settings: &ControlSettings, input: f32) -> TillerOutput {
    let mut output = TillerOutput::default();

    if input < settings.tiller_deadzone {
        return output;
    }

    output.side = ramp(input, settings.tiller_deadzone, settings.tiller_max_turn_threshold);

    if input > settings.tiller_handbrake_threshold_begin {
        output.handbrake = ramp(
            input,
            settings.tiller_handbrake_threshold_begin,
            settings.tiller_handbrake_threshold_end,
        );
    }

    output
}

/// Maps a normalized report to the keyboard intent.
///
/// Reverse is never driven: there is no gear selector yet, so the reverse
/// duty cycle stays at 0 regardless of `report.gear`.
#[must_use]
pub fn map(settings: &ControlSettings, report: &NormalizedReport) -> Intent {
    let forward = map_pedal(settings, report.accelerator);
    let left = map_tiller(settings, report.left_tiller);
    let right = map_tiller(settings, report.right_tiller);

    Intent {
        forward,
        left: left.side,
        right: right.side,
        reverse: 0.0,
        handbrake: left.handbrake.max(right.handbrake),
    }
}

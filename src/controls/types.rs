//! # Control Data Types
//!
//! Values that flow through the control pipeline: raw readings, calibration
//! bounds, shaping settings, normalized reports and the duty-cycle intent.

use serde::{Deserialize, Serialize};

/// Lowest code the 12-bit pedal ADC produces.
pub const PEDAL_RAW_MIN: u16 = 0;
/// Highest code the 12-bit pedal ADC produces.
pub const PEDAL_RAW_MAX: u16 = 4095;

/// Lowest 24-bit two's-complement force sensor conversion.
pub const TILLER_RAW_MIN: i32 = -8_388_608;
/// Highest 24-bit two's-complement force sensor conversion.
pub const TILLER_RAW_MAX: i32 = 8_388_607;

/// One acquisition tick's raw readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawSample {
    /// Accelerator pedal ADC code. High when the pedal is released.
    pub accelerator: u16,
    /// Brake pedal ADC code.
    pub brake: u16,
    /// Clutch pedal ADC code.
    pub clutch: u16,
    /// Left tiller force sensor conversion.
    pub left_tiller: i32,
    /// Right tiller force sensor conversion.
    pub right_tiller: i32,
}

impl RawSample {
    /// Pedals released, tillers unloaded.
    pub const RESTING: Self = Self {
        accelerator: PEDAL_RAW_MAX,
        brake: PEDAL_RAW_MAX,
        clutch: PEDAL_RAW_MAX,
        left_tiller: 0,
        right_tiller: 0,
    };

    /// Every channel at its theoretical minimum.
    pub const LOWEST: Self = Self {
        accelerator: PEDAL_RAW_MIN,
        brake: PEDAL_RAW_MIN,
        clutch: PEDAL_RAW_MIN,
        left_tiller: TILLER_RAW_MIN,
        right_tiller: TILLER_RAW_MIN,
    };

    /// Every channel at its theoretical maximum.
    pub const HIGHEST: Self = Self {
        accelerator: PEDAL_RAW_MAX,
        brake: PEDAL_RAW_MAX,
        clutch: PEDAL_RAW_MAX,
        left_tiller: TILLER_RAW_MAX,
        right_tiller: TILLER_RAW_MAX,
    };
}

/// Observed raw extremes used to scale readings into [0, 1].
///
/// `min <= current <= max` only holds loosely: live readings can drift past
/// the recorded bounds, so scaling always clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalibrationBounds {
    pub min: RawSample,
    pub max: RawSample,
}

impl CalibrationBounds {
    /// Inverted bounds so the first accumulated sample sets both ends.
    pub const EMPTY: Self = Self {
        min: RawSample::HIGHEST,
        max: RawSample::LOWEST,
    };

    /// Bounds covering every representable reading.
    pub const FULL_RANGE: Self = Self {
        min: RawSample::LOWEST,
        max: RawSample::HIGHEST,
    };

    /// Widens the bounds to include `sample`.
    pub fn include(&mut self, sample: &RawSample) {
        self.min.accelerator = self.min.accelerator.min(sample.accelerator);
        self.min.brake = self.min.brake.min(sample.brake);
        self.min.clutch = self.min.clutch.min(sample.clutch);
        self.min.left_tiller = self.min.left_tiller.min(sample.left_tiller);
        self.min.right_tiller = self.min.right_tiller.min(sample.right_tiller);

        self.max.accelerator = self.max.accelerator.max(sample.accelerator);
        self.max.brake = self.max.brake.max(sample.brake);
        self.max.clutch = self.max.clutch.max(sample.clutch);
        self.max.left_tiller = self.max.left_tiller.max(sample.left_tiller);
        self.max.right_tiller = self.max.right_tiller.max(sample.right_tiller);
    }
}

/// Shaping parameters for the output mapper.
///
/// All thresholds are fractions of the normalized [0, 1] input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Minimum pedal application before any output.
    #[serde(default = "default_pedal_deadzone")]
    pub pedal_deadzone: f32,

    /// Minimum tiller pull before any output.
    #[serde(default = "default_tiller_deadzone")]
    pub tiller_deadzone: f32,

    /// Tiller pull that gives 100% turning.
    #[serde(default = "default_tiller_max_turn_threshold")]
    pub tiller_max_turn_threshold: f32,

    /// Tiller pull where the handbrake starts to engage.
    #[serde(default = "default_tiller_handbrake_threshold_begin")]
    pub tiller_handbrake_threshold_begin: f32,

    /// Tiller pull where the handbrake is fully engaged.
    #[serde(default = "default_tiller_handbrake_threshold_end")]
    pub tiller_handbrake_threshold_end: f32,
}

fn default_pedal_deadzone() -> f32 { 0.07 }
fn default_tiller_deadzone() -> f32 { 0.07 }
fn default_tiller_max_turn_threshold() -> f32 { 0.65 }
fn default_tiller_handbrake_threshold_begin() -> f32 { 0.8 }
fn default_tiller_handbrake_threshold_end() -> f32 { 0.9 }

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            pedal_deadzone: default_pedal_deadzone(),
            tiller_deadzone: default_tiller_deadzone(),
            tiller_max_turn_threshold: default_tiller_max_turn_threshold(),
            tiller_handbrake_threshold_begin: default_tiller_handbrake_threshold_begin(),
            tiller_handbrake_threshold_end: default_tiller_handbrake_threshold_end(),
        }
    }
}

impl ControlSettings {
    /// Checks the thresholds describe usable ramps.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn check(&self) -> std::result::Result<(), String> {
        let unit = |name: &str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(format!("{} must be between 0.0 and 1.0", name))
            }
        };

        unit("pedal_deadzone", self.pedal_deadzone)?;
        unit("tiller_deadzone", self.tiller_deadzone)?;
        unit("tiller_max_turn_threshold", self.tiller_max_turn_threshold)?;
        unit("tiller_handbrake_threshold_begin", self.tiller_handbrake_threshold_begin)?;
        unit("tiller_handbrake_threshold_end", self.tiller_handbrake_threshold_end)?;

        if self.pedal_deadzone >= 1.0 {
            return Err("pedal_deadzone must be less than 1.0".to_string());
        }
        if self.tiller_deadzone >= self.tiller_max_turn_threshold {
            return Err("tiller_deadzone must be less than tiller_max_turn_threshold".to_string());
        }
        if self.tiller_handbrake_threshold_begin >= self.tiller_handbrake_threshold_end {
            return Err(
                "tiller_handbrake_threshold_begin must be less than tiller_handbrake_threshold_end"
                    .to_string(),
            );
        }

        Ok(())
    }
}

/// Gear selection reported alongside the axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gear {
    #[default]
    Forward,
    Reverse,
}

/// Axis values scaled into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NormalizedReport {
    pub accelerator: f32,
    pub left_tiller: f32,
    pub right_tiller: f32,
    pub gear: Gear,
}

/// Duty-cycle fractions for each keyboard output, all in [0, 1].
///
/// Each value is the share of every emission period during which the key is
/// held down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Intent {
    pub forward: f32,
    pub left: f32,
    pub right: f32,
    pub reverse: f32,
    pub handbrake: f32,
}

impl Intent {
    /// Every key released.
    pub const NEUTRAL: Self = Self {
        forward: 0.0,
        left: 0.0,
        right: 0.0,
        reverse: 0.0,
        handbrake: 0.0,
    };
}

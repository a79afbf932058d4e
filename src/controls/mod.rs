//! # Controls Module
//!
//! Signal conditioning and output shaping.
//!
//! This module handles:
//! - Scaling raw pedal and tiller readings into [0, 1]
//! - Capturing calibration bounds while the calibration switch is on
//! - Applying deadzones, turn and handbrake thresholds
//! - Producing the duty-cycle intent for the keyboard

pub mod conditioner;
pub mod mapper;
pub mod types;

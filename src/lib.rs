//! # Tank Controls Library
//!
//! Drive a tank game with real pedals and force-sensing tillers.
//!
//! The console samples three pedal potentiometers and two HX710C load cells,
//! scales them with stored calibration bounds, shapes them with deadzones and
//! thresholds, and presents the result to the host as a USB keyboard that
//! duty-cycles W, A, D, S and Space.
//!
//! Hardware is reached through the traits in [`hal`]; [`bench`] provides
//! simulated peripherals for running the full control loop on a development
//! machine.

pub mod bench;
pub mod config;
pub mod controls;
pub mod error;
pub mod fault;
pub mod hal;
pub mod keyboard;
pub mod sensor;
pub mod storage;
pub mod tasks;

//! # Tasks Module
//!
//! The two periodic tasks of the console. Both run on `tokio` intervals,
//! which schedule each tick from the previous deadline rather than from when
//! the last tick finished, so the rate does not drift.
//!
//! This module handles:
//! - Input acquisition, conditioning and mapping
//! - Keyboard report emission

pub mod input_task;
pub mod keyboard_task;

pub use input_task::{InputOptions, InputTask};
pub use keyboard_task::{KeyboardOptions, KeyboardTask};

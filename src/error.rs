//! # Error Types
//!
//! Custom error types for Tank Controls using `thiserror`.

use thiserror::Error;

use crate::fault::Fault;
use crate::hal::HalError;
use crate::sensor::hx710c::Hx710cError;

/// Main error type for Tank Controls
#[derive(Debug, Error)]
pub enum TankError {
    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but a value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peripheral (ADC, HID sink, flash) errors
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    /// Force sensor bus errors
    #[error("Force sensor error: {0}")]
    ForceSensor(#[from] Hx710cError),

    /// Unrecoverable integrity fault
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Result type alias for Tank Controls
pub type Result<T> = std::result::Result<T, TankError>;

//! # Calibration Store
//!
//! Keeps the configuration record in a dedicated flash sector.
//!
//! This module handles:
//! - Loading and validating the record at startup
//! - Writing a default record when none is present
//! - Saving calibration bounds and control settings
//! - Skipping rewrites that would not change the stored image
//! - Verifying every rewrite by reading it back
//!
//! A failed erase or program, or a read-back that differs from what was
//! written, is an integrity [`Fault`](crate::fault::Fault): the sector can no
//! longer be trusted.

pub mod record;

use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::controls::types::{CalibrationBounds, ControlSettings};
use crate::ensure_invariant;
use crate::error::Result;
use crate::fault::Fault;
use crate::hal::{ConfigFlash, CriticalSection};
use record::{Decoded, PersistedConfig, RECORD_SIZE};

/// Whether a save reached the flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The sector was erased and reprogrammed.
    Written,
    /// The stored image already matched; nothing was written.
    Unchanged,
}

struct StoreState<F> {
    flash: F,
    config: PersistedConfig,
}

/// Serialized access to the persisted configuration.
pub struct CalibrationStore<F, C> {
    state: Mutex<StoreState<F>>,
    cs: C,
}

impl<F, C> CalibrationStore<F, C>
where
    F: ConfigFlash,
    C: CriticalSection,
{
    /// Loads the record, writing the default one if the sector holds none.
    ///
    /// # Errors
    ///
    /// Returns an error if the sector can not be read, or a fault if writing
    /// the default record fails.
    pub fn open(flash: F, cs: C) -> Result<Self> {
        let mut stored = [0u8; RECORD_SIZE];
        flash.read(&mut stored)?;

        let store = match PersistedConfig::decode(&stored) {
            Decoded::Valid(config) => {
                info!("Loaded configuration record");
                Self::with_state(flash, config, cs)
            }
            Decoded::Invalid(reason) => {
                warn!("Invalid configuration record ({}), writing defaults", reason);
                let store = Self::with_state(flash, PersistedConfig::default(), cs);
                store.update(|_| {})?;
                store
            }
        };

        Ok(store)
    }

    fn with_state(flash: F, config: PersistedConfig, cs: C) -> Self {
        Self {
            state: Mutex::new(StoreState { flash, config }),
            cs,
        }
    }

    /// Returns the accepted record.
    #[must_use]
    pub fn load(&self) -> PersistedConfig {
        self.lock().config
    }

    /// Stored calibration bounds, if a calibration was ever saved.
    #[must_use]
    pub fn calibration(&self) -> Option<CalibrationBounds> {
        self.lock().config.calibration
    }

    /// Stored control settings, if present and usable.
    #[must_use]
    pub fn control_settings(&self) -> Option<ControlSettings> {
        let settings = self.lock().config.settings?;
        match settings.check() {
            Ok(()) => Some(settings),
            Err(reason) => {
                warn!("Ignoring stored control settings: {}", reason);
                None
            }
        }
    }

    /// Persists new calibration bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the sector can not be read, or a fault if the
    /// rewrite fails or does not verify.
    pub fn save_calibration(&self, bounds: &CalibrationBounds) -> Result<WriteOutcome> {
        debug!("Saving calibration: min {:?} max {:?}", bounds.min, bounds.max);
        self.update(|config| config.calibration = Some(*bounds))
    }

    /// Persists new control settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the sector can not be read, or a fault if the
    /// rewrite fails or does not verify.
    pub fn save_control_settings(&self, settings: &ControlSettings) -> Result<WriteOutcome> {
        self.update(|config| config.settings = Some(*settings))
    }

    fn update(&self, change: impl FnOnce(&mut PersistedConfig)) -> Result<WriteOutcome> {
        let mut state = self.lock();
        let mut config = state.config;
        change(&mut config);
        let image = config.encode();

        let mut stored = [0u8; RECORD_SIZE];
        state.flash.read(&mut stored)?;
        if stored[..] == image[..] {
            debug!("Configuration unchanged, skipping write");
            state.config = config;
            return Ok(WriteOutcome::Unchanged);
        }

        let flash = &mut state.flash;
        self.cs.run(|| -> std::result::Result<(), Fault> {
            flash
                .erase()
                .map_err(|e| Fault::new("flash.erase().is_ok()", e.to_string()))?;
            flash
                .program(&image)
                .map_err(|e| Fault::new("flash.program(&image).is_ok()", e.to_string()))?;
            Ok(())
        })?;
        state.config = config;

        state
            .flash
            .read(&mut stored)
            .map_err(|e| Fault::new("flash.read(&mut stored).is_ok()", e.to_string()))?;
        if stored[..] != image[..] {
            // Mirror whatever the sector really holds before faulting
            if let Decoded::Valid(actual) = PersistedConfig::decode(&stored) {
                state.config = actual;
            }
        }
        ensure_invariant!(
            stored[..] == image[..],
            "configuration sector does not match the image just written"
        );

        debug!("Configuration written");
        Ok(WriteOutcome::Written)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState<F>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

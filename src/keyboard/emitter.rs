//! # Duty-Cycle Emitter
//!
//! Turns fractional intents into key presses. Time is divided into fixed
//! periods; a key is held for the first `duty_cycle` share of every period and
//! released for the rest. The emitter runs once per transport tick and sends
//! exactly one report per tick the endpoint is ready for.
//!
//! ## Per Tick
//!
//! 1. Poll the kill switch
//! 2. Skip the tick if the endpoint is busy
//! 3. Start a new period once the current one has elapsed, adopting the latest
//!    published intent
//! 4. Press every key whose duty cycle exceeds the elapsed share of the period
//! 5. Release everything while the kill switch is engaged
//! 6. Replace every N-th report with an empty one so a key the host missed the
//!    release of can not stay stuck

use std::time::Duration;

use embedded_hal::digital::InputPin;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::kill_switch::KillSwitch;
use super::mailbox::IntentReceiver;
use super::report::{KeyboardReport, Output};
use crate::controls::types::Intent;
use crate::hal::{HalError, HidKeyboard};

/// Default length of one duty-cycle period.
pub const DEFAULT_PWM_PERIOD: Duration = Duration::from_millis(100);

/// Default number of reports between forced all-keys-up reports.
pub const DEFAULT_STUCK_KEY_RESET_INTERVAL: u32 = 1000;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The endpoint was busy; nothing was sent.
    Skipped,
    /// A report was sent.
    Sent(KeyboardReport),
    /// An all-keys-up report was sent in place of the scheduled one.
    ClearedStuckKeys,
}

/// Keys pressed `fraction` of the way through a period.
///
/// ```
/// use tank_controls::controls::types::Intent;
/// use tank_controls::keyboard::emitter::keys_at;
/// use tank_controls::keyboard::report::scan_codes;
///
/// let intent = Intent { forward: 0.5, left: 0.25, ..Intent::NEUTRAL };
///
/// let early = keys_at(&intent, 0.1);
/// assert!(early.is_pressed(scan_codes::W) && early.is_pressed(scan_codes::A));
///
/// let late = keys_at(&intent, 0.4);
/// assert!(late.is_pressed(scan_codes::W) && !late.is_pressed(scan_codes::A));
/// ```
#[must_use]
pub fn keys_at(intent: &Intent, fraction: f64) -> KeyboardReport {
    let mut report = KeyboardReport::EMPTY;
    for output in Output::ALL {
        if fraction < f64::from(output.duty_cycle(intent)) {
            report.press(output.scan_code());
        }
    }
    report
}

/// Schedules key presses from the latest intent.
#[derive(Debug)]
pub struct DutyCycleEmitter<S, K> {
    sink: S,
    kill_switch: KillSwitch<K>,
    intents: IntentReceiver,
    intent: Intent,
    period: Duration,
    period_start: Instant,
    reports_sent: u32,
    reset_interval: u32,
}

impl<S, K> DutyCycleEmitter<S, K>
where
    S: HidKeyboard,
    K: InputPin,
{
    /// Creates an emitter whose first period starts at `now`.
    ///
    /// An intent already waiting in the mailbox is adopted immediately.
    /// `period` must be non-zero; a `reset_interval` of 0 is treated as 1.
    #[must_use]
    pub fn new(
        sink: S,
        kill_switch: KillSwitch<K>,
        mut intents: IntentReceiver,
        period: Duration,
        reset_interval: u32,
        now: Instant,
    ) -> Self {
        let intent = intents.try_take().unwrap_or(Intent::NEUTRAL);

        Self {
            sink,
            kill_switch,
            intents,
            intent,
            period,
            period_start: now,
            reports_sent: 0,
            reset_interval: reset_interval.max(1),
        }
    }

    /// The intent the current period is emitting.
    #[must_use]
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// Reports sent since the last forced all-keys-up report.
    #[must_use]
    pub fn reports_sent(&self) -> u32 {
        self.reports_sent
    }

    /// Runs one transport tick.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's error if the report could not be queued. The
    /// stuck-key counter does not advance in that case.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, HalError> {
        let killed = self.kill_switch.poll();

        if !self.sink.ready() {
            trace!("HID endpoint busy, skipping tick");
            return Ok(TickOutcome::Skipped);
        }

        let mut elapsed = now.saturating_duration_since(self.period_start);
        if elapsed > self.period {
            self.period_start = now;
            elapsed = Duration::ZERO;
            if let Some(intent) = self.intents.try_take() {
                self.intent = intent;
            }
        }

        let fraction = elapsed.as_nanos() as f64 / self.period.as_nanos() as f64;
        let mut report = if killed {
            KeyboardReport::EMPTY
        } else {
            keys_at(&self.intent, fraction)
        };

        let clearing = self.reports_sent + 1 >= self.reset_interval;
        if clearing {
            report = KeyboardReport::EMPTY;
        }

        self.sink
            .send_keyboard_report(report.modifiers, report.reserved, report.keycodes)?;

        if clearing {
            debug!("Sent all-keys-up report after {} reports", self.reports_sent);
            self.reports_sent = 0;
            Ok(TickOutcome::ClearedStuckKeys)
        } else {
            self.reports_sent += 1;
            Ok(TickOutcome::Sent(report))
        }
    }
}

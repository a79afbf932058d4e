//! # Keyboard Task
//!
//! Drives the duty-cycle emitter on a fixed transport tick after a startup
//! delay that gives the host time to enumerate the keyboard.

use std::time::Duration;

use embedded_hal::digital::InputPin;
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, info, warn};

use crate::fault::Halt;
use crate::hal::HidKeyboard;
use crate::keyboard::emitter::{
    DutyCycleEmitter, DEFAULT_PWM_PERIOD, DEFAULT_STUCK_KEY_RESET_INTERVAL,
};
use crate::keyboard::kill_switch::KillSwitch;
use crate::keyboard::mailbox::IntentReceiver;

/// Default transport tick.
pub const DEFAULT_KEYBOARD_PERIOD: Duration = Duration::from_millis(5);

/// Default wait before the first report.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(1);

/// Tunables for the keyboard task.
#[derive(Debug, Clone, Copy)]
pub struct KeyboardOptions {
    pub period: Duration,
    pub pwm_period: Duration,
    pub startup_delay: Duration,
    pub stuck_key_reset_interval: u32,
}

impl Default for KeyboardOptions {
    fn default() -> Self {
        Self {
            period: DEFAULT_KEYBOARD_PERIOD,
            pwm_period: DEFAULT_PWM_PERIOD,
            startup_delay: DEFAULT_STARTUP_DELAY,
            stuck_key_reset_interval: DEFAULT_STUCK_KEY_RESET_INTERVAL,
        }
    }
}

/// Periodic keyboard report emission.
pub struct KeyboardTask<S, K> {
    sink: S,
    kill_switch: KillSwitch<K>,
    intents: IntentReceiver,
    halt: Halt,
    options: KeyboardOptions,
}

impl<S, K> KeyboardTask<S, K>
where
    S: HidKeyboard,
    K: InputPin,
{
    #[must_use]
    pub fn new(
        sink: S,
        kill_switch: KillSwitch<K>,
        intents: IntentReceiver,
        halt: Halt,
        options: KeyboardOptions,
    ) -> Self {
        Self {
            sink,
            kill_switch,
            intents,
            halt,
            options,
        }
    }

    /// Waits out the startup delay, then emits until the system halts.
    ///
    /// The first duty-cycle period starts when the delay ends.
    pub async fn run(self) {
        sleep(self.options.startup_delay).await;

        let mut emitter = DutyCycleEmitter::new(
            self.sink,
            self.kill_switch,
            self.intents,
            self.options.pwm_period,
            self.options.stuck_key_reset_interval,
            Instant::now(),
        );
        info!(
            "Keyboard task running every {:?} with a {:?} duty-cycle period",
            self.options.period, self.options.pwm_period
        );

        let mut ticker = interval(self.options.period);
        loop {
            ticker.tick().await;
            if self.halt.is_halted() {
                break;
            }
            if let Err(e) = emitter.tick(Instant::now()) {
                warn!("Failed to send keyboard report: {}", e);
            }
        }

        debug!("Keyboard task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{RecordingHid, SimSwitch};
    use crate::controls::types::Intent;
    use crate::fault::{halt_channel, Fault};
    use crate::keyboard::mailbox::intent_mailbox;
    use crate::keyboard::report::scan_codes;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_during_startup_delay() {
        let hid = RecordingHid::new();
        let (_publisher, receiver) = intent_mailbox();
        let (halt, _monitor) = halt_channel();
        let kill = KillSwitch::new(SimSwitch::new(true), 1);

        let task = KeyboardTask::new(hid.clone(), kill, receiver, halt, KeyboardOptions::default());
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(ms(990)).await;
        assert_eq!(hid.sent(), 0);

        tokio::time::sleep(ms(60)).await;
        assert!(hid.sent() >= 10);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_published_intent() {
        let hid = RecordingHid::new();
        let (publisher, receiver) = intent_mailbox();
        let (halt, _monitor) = halt_channel();
        let kill = KillSwitch::new(SimSwitch::new(true), 1);
        publisher.publish(Intent { forward: 1.0, ..Intent::NEUTRAL });

        let task = KeyboardTask::new(hid.clone(), kill, receiver, halt, KeyboardOptions::default());
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(ms(1020)).await;
        let last = hid.last().unwrap();
        assert!(last.is_pressed(scan_codes::W));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_halt() {
        let hid = RecordingHid::new();
        let (_publisher, receiver) = intent_mailbox();
        let (halt, _monitor) = halt_channel();
        let kill = KillSwitch::new(SimSwitch::new(true), 1);
        let options = KeyboardOptions {
            startup_delay: Duration::ZERO,
            ..KeyboardOptions::default()
        };

        let handle = tokio::spawn(KeyboardTask::new(hid.clone(), kill, receiver, halt.clone(), options).run());
        tokio::time::sleep(ms(20)).await;

        halt.halt(Fault::new("test", "stop"));
        handle.await.unwrap();

        let sent = hid.sent();
        tokio::time::sleep(ms(50)).await;
        assert_eq!(hid.sent(), sent);
    }
}

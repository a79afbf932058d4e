//! # Input Task
//!
//! Samples the controls on a fixed tick, conditions and maps them, and
//! publishes the resulting intent for the keyboard task.
//!
//! While the calibration switch is on the task publishes a neutral intent so
//! the vehicle stays still, and widens the calibration bounds with every
//! sample. Turning the switch off saves the captured bounds.

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::InputPin;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn, Level};

use crate::controls::conditioner::{ModeSwitch, SignalConditioner};
use crate::controls::mapper::map;
use crate::controls::types::{CalibrationBounds, ControlSettings, Intent};
use crate::error::{Result, TankError};
use crate::fault::Halt;
use crate::hal::{ConfigFlash, CriticalSection, PedalAdc};
use crate::keyboard::mailbox::IntentPublisher;
use crate::sensor::{Acquisition, ForceSensor, DEFAULT_PRIME_POLL};
use crate::storage::{CalibrationStore, WriteOutcome};

/// Default acquisition tick.
pub const DEFAULT_INPUT_PERIOD: Duration = Duration::from_millis(25);

/// Tunables for the input task.
#[derive(Debug, Clone, Copy)]
pub struct InputOptions {
    /// Acquisition tick.
    pub period: Duration,
    /// Settings used when none are stored.
    pub settings: ControlSettings,
    /// Start every calibration run from empty bounds.
    pub reset_calibration_on_entry: bool,
    /// Log every normalized report as JSON at debug level.
    pub log_reports: bool,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            period: DEFAULT_INPUT_PERIOD,
            settings: ControlSettings::default(),
            reset_calibration_on_entry: true,
            log_reports: false,
        }
    }
}

/// Periodic acquisition, conditioning and mapping.
pub struct InputTask<S, A, C, P, F, FC> {
    acquisition: Acquisition<S, A, C>,
    mode: ModeSwitch<P>,
    conditioner: SignalConditioner,
    settings: ControlSettings,
    store: Arc<CalibrationStore<F, FC>>,
    publisher: IntentPublisher,
    halt: Halt,
    period: Duration,
    log_reports: bool,
}

impl<S, A, C, P, F, FC> InputTask<S, A, C, P, F, FC>
where
    S: ForceSensor,
    A: PedalAdc,
    C: CriticalSection,
    P: InputPin,
    F: ConfigFlash,
    FC: CriticalSection,
{
    /// Builds the task from the stored calibration and settings.
    ///
    /// Falls back to full-range bounds when nothing was calibrated and to
    /// `options.settings` when no usable settings are stored.
    #[must_use]
    pub fn new(
        acquisition: Acquisition<S, A, C>,
        mode: ModeSwitch<P>,
        store: Arc<CalibrationStore<F, FC>>,
        publisher: IntentPublisher,
        halt: Halt,
        options: InputOptions,
    ) -> Self {
        let bounds = store.calibration().unwrap_or_else(|| {
            warn!("No stored calibration, using the full sensor range");
            CalibrationBounds::FULL_RANGE
        });
        let settings = store.control_settings().unwrap_or(options.settings);
        debug!("Control settings: {:?}", settings);

        Self {
            acquisition,
            mode,
            conditioner: SignalConditioner::new(bounds, options.reset_calibration_on_entry),
            settings,
            store,
            publisher,
            halt,
            period: options.period,
            log_reports: options.log_reports,
        }
    }

    /// Settings the mapper is using.
    #[must_use]
    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    /// Runs one acquisition tick.
    ///
    /// # Errors
    ///
    /// Returns an error if a peripheral fails, or a fault if saving a finished
    /// calibration fails.
    pub fn step(&mut self, now: Instant) -> Result<()> {
        let acquired = self.acquisition.sample()?;
        let mode = self.mode.poll(now);
        let conditioned = self.conditioner.process(&acquired.sample, mode);

        if let Some(bounds) = conditioned.finished_calibration {
            match self.store.save_calibration(&bounds)? {
                WriteOutcome::Written => info!("Calibration saved."),
                WriteOutcome::Unchanged => debug!("Calibration unchanged."),
            }
        }

        match conditioned.report {
            Some(report) => {
                if self.log_reports {
                    if let Ok(json) = serde_json::to_string(&report) {
                        debug!("{}", json);
                    }
                }
                self.publisher.publish(map(&self.settings, &report));
            }
            None => {
                if tracing::enabled!(Level::DEBUG) {
                    if let Ok(json) = serde_json::to_string(self.conditioner.bounds()) {
                        debug!("Calibration: {}", json);
                    }
                }
                self.publisher.publish(Intent::NEUTRAL);
            }
        }

        Ok(())
    }

    /// Runs one tick and escalates faults. Returns false once halted.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Err(e) = self.step(now) {
            self.handle_error(e);
        }
        !self.halt.is_halted()
    }

    fn handle_error(&self, error: TankError) {
        match error {
            TankError::Fault(fault) => self.halt.halt(fault),
            other => warn!("Input tick failed: {}", other),
        }
    }

    /// Waits for the force sensors, then ticks until the system halts.
    pub async fn run(mut self) {
        while let Err(e) = self.acquisition.prime(DEFAULT_PRIME_POLL).await {
            warn!("Force sensor priming failed: {}", e);
            if self.halt.is_halted() {
                return;
            }
            tokio::time::sleep(self.period).await;
        }

        info!("Input task running every {:?}", self.period);
        let mut ticker = interval(self.period);

        loop {
            ticker.tick().await;
            if self.halt.is_halted() || !self.tick(Instant::now()) {
                break;
            }
        }

        debug!("Input task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{NoDelay, RamFlash, SimClockPin, SimDataPin, SimForceBus, SimPedals, SimSwitch};
    use crate::controls::conditioner::DEFAULT_SWITCH_DEBOUNCE;
    use crate::controls::types::RawSample;
    use crate::fault::halt_channel;
    use crate::hal::{MockConfigFlash, PedalChannel, SchedulerSuspend};
    use crate::keyboard::mailbox::{intent_mailbox, IntentReceiver};
    use crate::sensor::hx710c::Hx710c;
    use crate::storage::record::PersistedConfig;

    type BenchSensor = Hx710c<SimClockPin, SimDataPin, NoDelay, 2>;
    type BenchTask<F> = InputTask<
        BenchSensor,
        crate::bench::SimPedalAdc,
        SchedulerSuspend,
        SimSwitch,
        F,
        SchedulerSuspend,
    >;

    struct Rig {
        bus: SimForceBus,
        pedals: SimPedals,
        switch: SimSwitch,
        receiver: IntentReceiver,
        monitor: crate::fault::HaltMonitor,
    }

    fn build<F: ConfigFlash>(store: CalibrationStore<F, SchedulerSuspend>) -> (BenchTask<F>, Rig) {
        let bus = SimForceBus::new(2);
        let pedals = SimPedals::new();
        let switch = SimSwitch::new(true);
        let cs = SchedulerSuspend::new();

        let sensor = Hx710c::new(bus.clock_pin(), [bus.data_pin(0), bus.data_pin(1)], NoDelay, &cs)
            .unwrap();
        let acquisition = Acquisition::new(sensor, pedals.adc(), cs);
        let mode = ModeSwitch::new(switch.clone(), DEFAULT_SWITCH_DEBOUNCE);
        let (publisher, receiver) = intent_mailbox();
        let (halt, monitor) = halt_channel();

        let task = InputTask::new(
            acquisition,
            mode,
            Arc::new(store),
            publisher,
            halt,
            InputOptions::default(),
        );

        (
            task,
            Rig {
                bus,
                pedals,
                switch,
                receiver,
                monitor,
            },
        )
    }

    fn ram_store() -> (RamFlash, CalibrationStore<RamFlash, SchedulerSuspend>) {
        let flash = RamFlash::new(4096);
        let store = CalibrationStore::open(flash.clone(), SchedulerSuspend::new()).unwrap();
        (flash, store)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_publishes_mapped_intent() {
        let (_flash, store) = ram_store();
        let (mut task, mut rig) = build(store);

        rig.pedals.set(PedalChannel::Accelerator, 0);
        rig.bus.latch(&[0, 0]);
        task.step(Instant::now()).unwrap();

        let intent = rig.receiver.try_take().unwrap();
        assert_eq!(intent.forward, 1.0);
        assert_eq!(intent.reverse, 0.0);
    }

    #[test]
    fn test_stored_settings_override_options() {
        let (_flash, store) = ram_store();
        let stored = ControlSettings {
            pedal_deadzone: 0.2,
            ..ControlSettings::default()
        };
        store.save_control_settings(&stored).unwrap();

        let (task, _rig) = build(store);

        assert_eq!(task.settings(), &stored);
    }

    #[test]
    fn test_calibration_cycle_publishes_neutral_and_saves() {
        let (flash, store) = ram_store();
        let (mut task, mut rig) = build(store);
        let start = Instant::now();
        let programs = flash.program_count();

        rig.switch.set_high(false);
        rig.pedals.set(PedalChannel::Accelerator, 300);
        rig.bus.latch(&[-1000, -900]);
        task.step(start).unwrap();
        assert_eq!(rig.receiver.try_take(), Some(Intent::NEUTRAL));

        rig.pedals.set(PedalChannel::Accelerator, 3900);
        rig.bus.latch(&[50_000, 40_000]);
        task.step(start + ms(25)).unwrap();
        assert_eq!(rig.receiver.try_take(), Some(Intent::NEUTRAL));
        assert_eq!(flash.program_count(), programs);

        rig.switch.set_high(true);
        task.step(start + ms(250)).unwrap();

        let saved = PersistedConfig::decode(&flash.contents());
        let expected_min = RawSample {
            accelerator: 300,
            brake: 4095,
            clutch: 4095,
            left_tiller: -1000,
            right_tiller: -900,
        };
        let expected_max = RawSample {
            accelerator: 3900,
            brake: 4095,
            clutch: 4095,
            left_tiller: 50_000,
            right_tiller: 40_000,
        };
        assert_eq!(
            saved,
            crate::storage::record::Decoded::Valid(PersistedConfig {
                calibration: Some(CalibrationBounds {
                    min: expected_min,
                    max: expected_max,
                }),
                settings: None,
            })
        );
        assert_eq!(flash.program_count(), programs + 1);

        // The exit tick already drives the outputs again
        let intent = rig.receiver.try_take().unwrap();
        assert_eq!(intent.left, 1.0);
    }

    #[test]
    fn test_save_fault_halts() {
        let image = PersistedConfig::default().encode();
        let mut flash = MockConfigFlash::new();
        flash.expect_read().returning(move |buf| {
            buf.copy_from_slice(&image[..buf.len()]);
            Ok(())
        });
        flash.expect_erase().returning(|| Ok(()));
        flash.expect_program().returning(|_| Ok(()));
        let store = CalibrationStore::open(flash, SchedulerSuspend::new()).unwrap();

        let (mut task, rig) = build(store);
        let start = Instant::now();

        rig.switch.set_high(false);
        assert!(task.tick(start));
        rig.switch.set_high(true);
        assert!(!task.tick(start + ms(250)));

        let fault = rig.monitor.fault().unwrap();
        assert!(fault.message.contains("does not match"));
    }

    #[test]
    fn test_sensor_not_ready_does_not_halt() {
        let (_flash, store) = ram_store();
        let (mut task, rig) = build(store);

        // Nothing latched, so tillers stay at their initial value
        assert!(task.tick(Instant::now()));
        assert!(rig.monitor.fault().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_for_sensor_then_publishes() {
        let (_flash, store) = ram_store();
        let (task, mut rig) = build(store);
        rig.pedals.set(PedalChannel::Accelerator, 0);

        let handle = tokio::spawn(task.run());

        tokio::time::sleep(ms(100)).await;
        assert_eq!(rig.receiver.try_take(), None);

        rig.bus.latch(&[0, 0]);
        tokio::time::sleep(ms(100)).await;

        let intent = rig.receiver.try_take().unwrap();
        assert_eq!(intent.forward, 1.0);

        handle.abort();
    }
}
